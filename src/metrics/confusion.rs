use std::fmt;

use crate::data::Dataset;
use crate::error::{NetError, Result};
use crate::math::matrix::argmax;
use crate::network::network::Network;

/// Counts of (actual, predicted) class pairs.
///
/// Rows are the true class, columns the predicted class, so the diagonal holds
/// correct predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
    labels: Option<Vec<String>>,
}

impl ConfusionMatrix {
    /// Builds the matrix from `(predicted, actual)` class pairs. Pairs naming a
    /// class outside `0..n_classes` are ignored.
    pub fn from_predictions(n_classes: usize, pairs: &[(usize, usize)]) -> ConfusionMatrix {
        let mut counts = vec![vec![0usize; n_classes]; n_classes];
        for &(predicted, actual) in pairs {
            if predicted < n_classes && actual < n_classes {
                counts[actual][predicted] += 1;
            }
        }
        ConfusionMatrix { counts, labels: None }
    }

    /// Row and column names used by `Display`.
    pub fn with_labels(mut self, labels: Vec<String>) -> ConfusionMatrix {
        if labels.len() == self.counts.len() {
            self.labels = Some(labels);
        }
        self
    }

    pub fn n_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts
            .get(actual)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.counts.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Diagonal share of all counts, as a percentage. Zero when empty.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 / total as f64 * 100.0
    }

    /// Runs every sample of `dataset` through `network` and tallies predicted
    /// classes against target classes (see [`class_of`]). A single-output
    /// network yields a 2×2 matrix over classes 0 and 1.
    pub fn evaluate(network: &Network, dataset: &Dataset) -> Result<ConfusionMatrix> {
        let output_size = network.config().output_size;
        let mut pairs = Vec::with_capacity(dataset.len());
        for (input, target) in dataset.inputs.iter().zip(dataset.targets.iter()) {
            if target.len() != output_size {
                return Err(NetError::mismatch("target vector", output_size, target.len()));
            }
            let output = network.predict(input)?;
            pairs.push((class_of(&output), class_of(target)));
        }
        Ok(ConfusionMatrix::from_predictions(output_size.max(2), &pairs))
    }

    fn label(&self, i: usize) -> String {
        match &self.labels {
            Some(labels) => labels[i].clone(),
            None => i.to_string(),
        }
    }
}

/// Class index of an output or target vector: argmax for two or more values,
/// `1` if a lone value exceeds 0.5 and `0` otherwise.
pub fn class_of(values: &[f64]) -> usize {
    match values {
        [single] => usize::from(*single > 0.5),
        _ => argmax(values),
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.counts.len();
        let width = (0..n)
            .map(|i| self.label(i).len() + 2)
            .chain(self.counts.iter().flatten().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);

        write!(f, "{:>w$}", "", w = width + 1)?;
        for c in 0..n {
            write!(f, " {:>w$}", format!("P:{}", self.label(c)), w = width)?;
        }
        writeln!(f)?;
        for (r, row) in self.counts.iter().enumerate() {
            write!(f, "{:>w$}", format!("T:{}", self.label(r)), w = width + 1)?;
            for v in row {
                write!(f, " {:>w$}", v, w = width)?;
            }
            writeln!(f)?;
        }
        write!(f, "accuracy: {:.2}% ({}/{})", self.accuracy(), self.correct(), self.total())
    }
}
