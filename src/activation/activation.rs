use serde::{Deserialize, Serialize};
use std::f64::consts::E;
use std::fmt;
use std::str::FromStr;

use crate::error::NetError;
use crate::math::matrix::Matrix;

/// The closed set of activation functions a layer may use.
///
/// Identifiers serialise as the names used in weight and config files
/// (`sigmoide`, `tanh`, `relu`, `leaky relu`, `lineal`, `softmax`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActivationFunction {
    Sigmoid,
    Tanh,
    ReLU,
    /// Negative inputs are scaled by the network's leaky slope.
    LeakyReLU,
    Linear,
    /// Vector-valued; normalised over the whole column in `apply()`.
    Softmax,
}

impl ActivationFunction {
    pub const ALL: [ActivationFunction; 6] = [
        ActivationFunction::Sigmoid,
        ActivationFunction::Tanh,
        ActivationFunction::ReLU,
        ActivationFunction::LeakyReLU,
        ActivationFunction::Linear,
        ActivationFunction::Softmax,
    ];

    /// Canonical identifier written to files.
    pub fn id(&self) -> &'static str {
        match self {
            ActivationFunction::Sigmoid => "sigmoide",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::ReLU => "relu",
            ActivationFunction::LeakyReLU => "leaky relu",
            ActivationFunction::Linear => "lineal",
            ActivationFunction::Softmax => "softmax",
        }
    }

    /// Element-wise activation. `Softmax` has no scalar form; use `apply()`.
    pub fn function(&self, x: f64, leaky_slope: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::LeakyReLU => if x > 0.0 { x } else { leaky_slope * x },
            ActivationFunction::Linear => x,
            ActivationFunction::Softmax => {
                panic!("ActivationFunction::Softmax::function() must not be called directly; \
                        use apply() which normalises the full column.")
            }
        }
    }

    /// Element-wise derivative evaluated at the pre-activation `x`.
    ///
    /// For `Softmax` this is the diagonal term `s·(1-s)`; it is only used when
    /// softmax sits in the hidden layer; as an output layer the backward pass
    /// takes `a - t` directly.
    pub fn derivative(&self, x: f64, leaky_slope: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            // x == 0 falls on the slope branch.
            ActivationFunction::LeakyReLU => if x > 0.0 { 1.0 } else { leaky_slope },
            ActivationFunction::Linear => 1.0,
            ActivationFunction::Softmax => {
                panic!("ActivationFunction::Softmax::derivative() must not be called directly; \
                        use apply_derivative().")
            }
        }
    }

    /// Applies the activation to every column of `net`.
    pub fn apply(&self, net: &Matrix, leaky_slope: f64) -> Matrix {
        match self {
            ActivationFunction::Softmax => softmax_columns(net),
            _ => net.map(|x| self.function(x, leaky_slope)),
        }
    }

    /// Derivative of `apply()` w.r.t. `net`, element by element.
    pub fn apply_derivative(&self, net: &Matrix, leaky_slope: f64) -> Matrix {
        match self {
            ActivationFunction::Softmax => softmax_columns(net).map(|s| s * (1.0 - s)),
            _ => net.map(|x| self.derivative(x, leaky_slope)),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + E.powf(-x))
}

/// Column-wise softmax with the max-subtraction trick, so the denominator is
/// always at least 1.
fn softmax_columns(net: &Matrix) -> Matrix {
    let mut res = Matrix::zeros(net.rows, net.cols);
    for j in 0..net.cols {
        let max = (0..net.rows)
            .map(|i| net.data[i][j])
            .fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for i in 0..net.rows {
            let e = (net.data[i][j] - max).exp();
            res.data[i][j] = e;
            sum += e;
        }
        for i in 0..net.rows {
            res.data[i][j] /= sum;
        }
    }
    res
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ActivationFunction {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sigmoide" | "sigmoid" => Ok(ActivationFunction::Sigmoid),
            "tanh" => Ok(ActivationFunction::Tanh),
            "relu" => Ok(ActivationFunction::ReLU),
            "leaky relu" | "leaky-relu" | "leaky_relu" | "leakyrelu" => Ok(ActivationFunction::LeakyReLU),
            "lineal" | "linear" | "identity" => Ok(ActivationFunction::Linear),
            "softmax" => Ok(ActivationFunction::Softmax),
            _ => Err(NetError::UnknownActivation(s.to_string())),
        }
    }
}

impl TryFrom<String> for ActivationFunction {
    type Error = NetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ActivationFunction> for String {
    fn from(a: ActivationFunction) -> Self {
        a.id().to_string()
    }
}
