use rand::Rng;

use crate::error::{NetError, Result};
use crate::math::matrix::{argmax, Matrix};
use crate::network::config::NetworkConfig;

/// Half-width of the uniform range used to initialise weights and biases.
const INIT_RANGE: f64 = 0.5;

/// A fully-connected `n → l → m` network.
///
/// `w_hidden` is `l × n` and `w_output` is `m × l`; the bias columns are
/// present iff `config.bias` is set. Shapes always agree with the config.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    config: NetworkConfig,
    pub(crate) w_hidden: Matrix,
    pub(crate) w_output: Matrix,
    pub(crate) t_hidden: Option<Matrix>,
    pub(crate) t_output: Option<Matrix>,
}

/// Intermediate values of one forward pass, all `rows × 1` columns.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    pub net_hidden: Matrix,
    pub a_hidden: Matrix,
    pub net_output: Matrix,
    pub a_output: Matrix,
}

impl Network {
    /// Validates `config` and initialises every weight uniformly in [-0.5, 0.5).
    pub fn new(config: NetworkConfig) -> Result<Network> {
        Network::with_rng(config, &mut rand::thread_rng())
    }

    /// Same as `new`, drawing initial weights from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(config: NetworkConfig, rng: &mut R) -> Result<Network> {
        config.validate()?;
        let (n, l, m) = (config.input_size, config.hidden_size, config.output_size);

        let w_hidden = Matrix::uniform(l, n, INIT_RANGE, rng);
        let w_output = Matrix::uniform(m, l, INIT_RANGE, rng);
        let (t_hidden, t_output) = if config.bias {
            (
                Some(Matrix::uniform(l, 1, INIT_RANGE, rng)),
                Some(Matrix::uniform(m, 1, INIT_RANGE, rng)),
            )
        } else {
            (None, None)
        };

        Ok(Network { config, w_hidden, w_output, t_hidden, t_output })
    }

    /// Assembles a network from explicit weights, checking every shape against
    /// `config`. Biases must be given iff `config.bias` is set.
    pub fn from_parts(
        config: NetworkConfig,
        w_hidden: Matrix,
        w_output: Matrix,
        t_hidden: Option<Matrix>,
        t_output: Option<Matrix>,
    ) -> Result<Network> {
        config.validate()?;
        let (n, l, m) = (config.input_size, config.hidden_size, config.output_size);

        check_shape("W_h", &w_hidden, (l, n))?;
        check_shape("W_o", &w_output, (m, l))?;
        match (&t_hidden, &t_output, config.bias) {
            (Some(th), Some(to), true) => {
                check_shape("Th", th, (l, 1))?;
                check_shape("To", to, (m, 1))?;
            }
            (None, None, false) => {}
            _ => {
                return Err(NetError::InvalidConfig(
                    "bias vectors must be supplied exactly when bias is enabled".into(),
                ))
            }
        }

        Ok(Network { config, w_hidden, w_output, t_hidden, t_output })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn hidden_weights(&self) -> &Matrix {
        &self.w_hidden
    }

    pub fn output_weights(&self) -> &Matrix {
        &self.w_output
    }

    pub fn hidden_bias(&self) -> Option<&Matrix> {
        self.t_hidden.as_ref()
    }

    pub fn output_bias(&self) -> Option<&Matrix> {
        self.t_output.as_ref()
    }

    /// Runs the forward pass for one sample and keeps every intermediate column.
    pub fn forward(&self, input: &[f64]) -> Result<ForwardPass> {
        self.check_input(input)?;
        Ok(self.forward_column(&Matrix::column(input)))
    }

    /// Forward pass on an already validated `n × 1` column.
    pub(crate) fn forward_column(&self, x: &Matrix) -> ForwardPass {
        let slope = self.config.leaky_slope;

        let mut net_hidden = &self.w_hidden * x;
        if let Some(th) = &self.t_hidden {
            net_hidden += th;
        }
        let a_hidden = self.config.hidden_activation().apply(&net_hidden, slope);

        let mut net_output = &self.w_output * &a_hidden;
        if let Some(to) = &self.t_output {
            net_output += to;
        }
        let a_output = self.config.output_activation().apply(&net_output, slope);

        ForwardPass { net_hidden, a_hidden, net_output, a_output }
    }

    /// Output vector (length `m`) for a single input of length `n`.
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        Ok(self.forward(input)?.a_output.to_column_vec())
    }

    /// Predicts every input in order. Fails on the first input of the wrong length.
    pub fn predict_batch(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        inputs.iter().map(|input| self.predict(input)).collect()
    }

    /// Index of the strongest output for `input`.
    pub fn classify(&self, input: &[f64]) -> Result<usize> {
        Ok(argmax(&self.predict(input)?))
    }

    /// Adds a weight/bias delta in place.
    pub(crate) fn apply_deltas(
        &mut self,
        dw_hidden: &Matrix,
        dw_output: &Matrix,
        dt_hidden: Option<&Matrix>,
        dt_output: Option<&Matrix>,
    ) {
        self.w_hidden += dw_hidden;
        self.w_output += dw_output;
        if let (Some(th), Some(d)) = (self.t_hidden.as_mut(), dt_hidden) {
            *th += d;
        }
        if let (Some(to), Some(d)) = (self.t_output.as_mut(), dt_output) {
            *to += d;
        }
    }

    /// Overwrites weights with those of `other`, which must share this shape.
    pub(crate) fn copy_weights_from(&mut self, other: &Network) {
        self.w_hidden.clone_from(&other.w_hidden);
        self.w_output.clone_from(&other.w_output);
        self.t_hidden.clone_from(&other.t_hidden);
        self.t_output.clone_from(&other.t_output);
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.config.input_size {
            return Err(NetError::mismatch("input vector", self.config.input_size, input.len()));
        }
        Ok(())
    }
}

fn check_shape(name: &str, m: &Matrix, expected: (usize, usize)) -> Result<()> {
    let (rows, cols) = m.shape();
    if rows != expected.0 {
        return Err(NetError::mismatch(format!("{} rows", name), expected.0, rows));
    }
    if cols != expected.1 {
        return Err(NetError::mismatch(format!("{} columns", name), expected.1, cols));
    }
    Ok(())
}
