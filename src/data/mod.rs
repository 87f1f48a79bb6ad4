pub mod patterns;
pub mod vowels;

pub use patterns::{load_patterns, parse_patterns};
pub use vowels::Vowel;

/// Paired input/target vectors ready for training.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<Vec<f64>>,
}

impl Dataset {
    pub fn push(&mut self, input: Vec<f64>, target: Vec<f64>) {
        self.inputs.push(input);
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Width of the first input vector (0 when empty).
    pub fn input_size(&self) -> usize {
        self.inputs.first().map_or(0, |v| v.len())
    }

    /// Width of the first target vector (0 when empty).
    pub fn output_size(&self) -> usize {
        self.targets.first().map_or(0, |v| v.len())
    }
}
