//! Loader for numeric pattern files.
//!
//! Format: one pattern per line, inputs and outputs separated by a single `|`,
//! values separated by whitespace:
//!
//! ```text
//! 0 0 | 0
//! 0 1 | 1
//! ```
//!
//! Blank lines are ignored; lines without exactly one `|` are skipped with a
//! warning. Every pattern must have the same input and output widths.

use std::path::Path;
use tracing::warn;

use crate::data::Dataset;
use crate::error::{NetError, Result};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reads and parses a pattern file.
pub fn load_patterns(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| NetError::io(path, e))?;
    parse_patterns(&text)
}

/// Parses pattern text into a dataset.
pub fn parse_patterns(text: &str) -> Result<Dataset> {
    let mut dataset = Dataset::default();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() != 2 {
            warn!(line = line_no, "skipping pattern line without a single '|' separator");
            continue;
        }

        let input = parse_values(parts[0], line_no, "input")?;
        let target = parse_values(parts[1], line_no, "output")?;

        if let Some(first) = dataset.inputs.first() {
            check_width(first.len(), input.len(), line_no, "input")?;
            check_width(dataset.output_size(), target.len(), line_no, "output")?;
        }
        dataset.push(input, target);
    }

    if dataset.is_empty() {
        return Err(NetError::InvalidTrainingInput(
            "no valid patterns found".into(),
        ));
    }

    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn parse_values(field: &str, line_no: usize, side: &str) -> Result<Vec<f64>> {
    let values = field
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| {
                NetError::InvalidTrainingInput(format!(
                    "line {}: {} value '{}' is not a number",
                    line_no, side, tok
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.is_empty() {
        return Err(NetError::InvalidTrainingInput(format!(
            "line {}: {} side is empty",
            line_no, side
        )));
    }
    Ok(values)
}

fn check_width(expected: usize, got: usize, line_no: usize, side: &str) -> Result<()> {
    if expected != got {
        return Err(NetError::InvalidTrainingInput(format!(
            "line {}: {} has {} values, previous patterns have {}",
            line_no, side, got, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xor_table() {
        let ds = parse_patterns("0 0 | 0\n0 1 | 1\n\n1 0 | 1\n1 1 | 0\n").unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.input_size(), 2);
        assert_eq!(ds.output_size(), 1);
        assert_eq!(ds.inputs[1], vec![0.0, 1.0]);
        assert_eq!(ds.targets[1], vec![1.0]);
    }

    #[test]
    fn skips_lines_without_separator() {
        let ds = parse_patterns("# header\n0.5 -1.5 | 1 0\n1 2 | 3 | 4\n2e-1 3 | 0 1\n").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.inputs[1], vec![0.2, 3.0]);
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = parse_patterns("0 x | 1\n").unwrap_err();
        assert!(matches!(err, NetError::InvalidTrainingInput(ref msg) if msg.contains("line 1")));
    }

    #[test]
    fn rejects_ragged_patterns() {
        assert!(matches!(
            parse_patterns("0 0 | 1\n0 0 0 | 1\n"),
            Err(NetError::InvalidTrainingInput(_))
        ));
        assert!(matches!(
            parse_patterns("0 0 | 1\n0 0 | 1 0\n"),
            Err(NetError::InvalidTrainingInput(_))
        ));
    }

    #[test]
    fn empty_file_is_invalid() {
        assert!(matches!(parse_patterns("\n\n"), Err(NetError::InvalidTrainingInput(_))));
    }

    #[test]
    fn missing_file_is_io_failure() {
        assert!(matches!(load_patterns("/no/such/patterns.txt"), Err(NetError::Io { .. })));
    }
}
