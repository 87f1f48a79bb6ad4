use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};

/// Hyper-parameters and shape of a two-layer network.
///
/// Field names on disk follow the config documents the lab tool has always
/// written (`capa_entrada`, `alfa`, `funciones_activacion`, ...), so existing
/// config files load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Input size `n`.
    #[serde(rename = "capa_entrada")]
    pub input_size: usize,
    /// Hidden size `l`.
    #[serde(rename = "capa_oculta")]
    pub hidden_size: usize,
    /// Output size `m`.
    #[serde(rename = "capa_salida")]
    pub output_size: usize,
    #[serde(rename = "alfa")]
    pub learning_rate: f64,
    #[serde(rename = "max_epocas")]
    pub max_epochs: usize,
    /// Training stops at the first epoch whose mean error is at or below this.
    pub precision: f64,
    #[serde(default = "default_true")]
    pub bias: bool,
    /// `[hidden, output]`.
    #[serde(rename = "funciones_activacion")]
    pub activations: [ActivationFunction; 2],
    #[serde(rename = "beta_leaky_relu", default = "default_leaky_slope")]
    pub leaky_slope: f64,
    #[serde(default)]
    pub momentum: bool,
    /// Momentum coefficient; read only when `momentum` is set.
    #[serde(rename = "beta", default)]
    pub momentum_beta: f64,
}

fn default_true() -> bool {
    true
}

fn default_leaky_slope() -> f64 {
    0.01
}

impl NetworkConfig {
    /// Sigmoid/sigmoid network with bias, `alfa = 0.1`, 1000 epochs and
    /// `precision = 0.01`.
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        NetworkConfig {
            input_size,
            hidden_size,
            output_size,
            learning_rate: 0.1,
            max_epochs: 1000,
            precision: 0.01,
            bias: true,
            activations: [ActivationFunction::Sigmoid, ActivationFunction::Sigmoid],
            leaky_slope: default_leaky_slope(),
            momentum: false,
            momentum_beta: 0.0,
        }
    }

    pub fn with_learning_rate(mut self, alfa: f64) -> Self {
        self.learning_rate = alfa;
        self
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_activations(mut self, hidden: ActivationFunction, output: ActivationFunction) -> Self {
        self.activations = [hidden, output];
        self
    }

    pub fn with_leaky_slope(mut self, slope: f64) -> Self {
        self.leaky_slope = slope;
        self
    }

    /// Enables momentum with coefficient `beta`.
    pub fn with_momentum(mut self, beta: f64) -> Self {
        self.momentum = true;
        self.momentum_beta = beta;
        self
    }

    pub fn hidden_activation(&self) -> ActivationFunction {
        self.activations[0]
    }

    pub fn output_activation(&self) -> ActivationFunction {
        self.activations[1]
    }

    /// Hidden-layer size proposed for `n` inputs and `m` outputs: `floor(sqrt(n·m))`,
    /// at least 1.
    pub fn suggested_hidden_size(input_size: usize, output_size: usize) -> usize {
        (((input_size * output_size) as f64).sqrt() as usize).max(1)
    }

    /// Checks the construction contract: positive layer sizes, `alfa > 0`,
    /// `max_epocas > 0`, and finite non-negative precision and coefficients.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("capa_entrada", self.input_size),
            ("capa_oculta", self.hidden_size),
            ("capa_salida", self.output_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(NetError::InvalidConfig(format!("{} must be greater than 0", name)));
            }
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NetError::InvalidConfig(format!(
                "alfa must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.max_epochs == 0 {
            return Err(NetError::InvalidConfig("max_epocas must be greater than 0".into()));
        }
        if !(self.precision.is_finite() && self.precision >= 0.0) {
            return Err(NetError::InvalidConfig(format!(
                "precision must be a non-negative number, got {}",
                self.precision
            )));
        }
        if self.activations.contains(&ActivationFunction::LeakyReLU) && !self.leaky_slope.is_finite() {
            return Err(NetError::InvalidConfig("beta_leaky_relu must be finite".into()));
        }
        if self.momentum && !(self.momentum_beta.is_finite() && self.momentum_beta >= 0.0) {
            return Err(NetError::InvalidConfig(format!(
                "momentum beta must be a non-negative number, got {}",
                self.momentum_beta
            )));
        }
        Ok(())
    }

    /// Reads a JSON config document. Unknown activation identifiers surface as
    /// `UnknownActivation`, everything else that fails to parse as `Malformed`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<NetworkConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| NetError::io(path, e))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| NetError::malformed(path, e))?;
        check_activation_ids(&value)?;
        let config: NetworkConfig =
            serde_json::from_value(value).map_err(|e| NetError::malformed(path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| NetError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|e| NetError::malformed(path, e))
    }
}

/// Parses the `funciones_activacion` identifiers of a config object up front so
/// a bad one is reported by name instead of as a generic JSON error.
pub(crate) fn check_activation_ids(config: &serde_json::Value) -> Result<()> {
    if let Some(ids) = config.get("funciones_activacion").and_then(|v| v.as_array()) {
        for id in ids.iter().filter_map(|v| v.as_str()) {
            id.parse::<ActivationFunction>()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        assert!(NetworkConfig::new(2, 2, 1).validate().is_ok());
    }

    #[test]
    fn rejects_zero_sizes_and_bad_rates() {
        let bad = [
            NetworkConfig::new(0, 2, 1),
            NetworkConfig::new(2, 0, 1),
            NetworkConfig::new(2, 2, 0),
            NetworkConfig::new(2, 2, 1).with_learning_rate(0.0),
            NetworkConfig::new(2, 2, 1).with_learning_rate(-0.1),
            NetworkConfig::new(2, 2, 1).with_max_epochs(0),
            NetworkConfig::new(2, 2, 1).with_precision(-1.0),
            NetworkConfig::new(2, 2, 1).with_momentum(f64::NAN),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(NetError::InvalidConfig(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn suggested_hidden_size_is_floor_sqrt() {
        assert_eq!(NetworkConfig::suggested_hidden_size(6912, 5), 185);
        assert_eq!(NetworkConfig::suggested_hidden_size(2, 1), 1);
        assert_eq!(NetworkConfig::suggested_hidden_size(8, 2), 4);
    }

    #[test]
    fn loads_legacy_config_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"capa_entrada": 4, "capa_oculta": 3, "capa_salida": 2, "alfa": 0.2,
                "max_epocas": 500, "precision": 0.001, "bias": false,
                "funciones_activacion": ["Leaky ReLU", "softmax"],
                "beta_leaky_relu": 0.1, "momentum": true, "beta": 0.9}}"#
        )
        .unwrap();

        let config = NetworkConfig::load_json(file.path()).unwrap();
        assert_eq!(config.input_size, 4);
        assert_eq!(config.hidden_size, 3);
        assert_eq!(config.output_size, 2);
        assert!(!config.bias);
        assert_eq!(config.hidden_activation(), ActivationFunction::LeakyReLU);
        assert_eq!(config.output_activation(), ActivationFunction::Softmax);
        assert!(config.momentum);
        assert_eq!(config.momentum_beta, 0.9);
    }

    #[test]
    fn unknown_activation_in_config_file_is_reported_by_name() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"capa_entrada": 2, "capa_oculta": 2, "capa_salida": 1, "alfa": 0.5,
                "max_epocas": 10, "precision": 0.0, "funciones_activacion": ["sigmoide", "mish"]}}"#
        )
        .unwrap();

        match NetworkConfig::load_json(file.path()) {
            Err(NetError::UnknownActivation(id)) => assert_eq!(id, "mish"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_config_file_is_io_failure() {
        let res = NetworkConfig::load_json("/definitely/not/here.json");
        assert!(matches!(res, Err(NetError::Io { .. })));
    }
}
