use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::activation::activation::ActivationFunction;
use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;
use crate::network::config::{check_activation_ids, NetworkConfig};
use crate::network::network::Network;

/// What to do when a weights file was trained with different layer sizes than
/// the network it is being loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Refuse with `DimensionMismatch`; the network is left untouched.
    #[default]
    Strict,
    /// Log a warning and reshape the network to the file's sizes.
    Adapt,
}

/// On-disk layout of a weights document.
///
/// `Th`/`To` are present iff the network uses bias; their absence on load
/// disables bias.
#[derive(Debug, Serialize, Deserialize)]
struct WeightsFile {
    #[serde(rename = "W_h")]
    w_hidden: Matrix,
    #[serde(rename = "W_o")]
    w_output: Matrix,
    #[serde(rename = "Th", default, skip_serializing_if = "Option::is_none")]
    t_hidden: Option<Matrix>,
    #[serde(rename = "To", default, skip_serializing_if = "Option::is_none")]
    t_output: Option<Matrix>,
    config: StoredConfig,
}

/// Shape and activation part of the config, plus the training parameters the
/// network was trained with (informational; absent in older files).
#[derive(Debug, Serialize, Deserialize)]
struct StoredConfig {
    capa_entrada: usize,
    capa_oculta: usize,
    capa_salida: usize,
    funciones_activacion: [ActivationFunction; 2],
    beta_leaky_relu: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alfa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_epocas: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    precision: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    momentum: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    beta: Option<f64>,
}

impl Network {
    /// Writes weights, biases and config to a pretty-printed JSON document.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config = self.config();
        let doc = WeightsFile {
            w_hidden: self.w_hidden.clone(),
            w_output: self.w_output.clone(),
            t_hidden: self.t_hidden.clone(),
            t_output: self.t_output.clone(),
            config: StoredConfig {
                capa_entrada: config.input_size,
                capa_oculta: config.hidden_size,
                capa_salida: config.output_size,
                funciones_activacion: config.activations,
                beta_leaky_relu: config.leaky_slope,
                alfa: Some(config.learning_rate),
                max_epocas: Some(config.max_epochs),
                precision: Some(config.precision),
                momentum: Some(config.momentum),
                beta: Some(config.momentum_beta),
            },
        };

        let file = std::fs::File::create(path).map_err(|e| NetError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &doc).map_err(|e| NetError::malformed(path, e))?;
        info!(path = %path.display(), "saved network weights");
        Ok(())
    }

    /// Replaces this network's weights with those stored at `path`.
    ///
    /// Activation functions, leaky slope and bias presence are taken from the
    /// file; training hyper-parameters stay as configured. Nothing is modified
    /// when an error is returned.
    pub fn load_weights(&mut self, path: impl AsRef<Path>, policy: LoadPolicy) -> Result<()> {
        let path = path.as_ref();
        let doc = read_weights_file(path)?;
        let stored = &doc.config;

        let mut config = self.config().clone();
        let sizes = [
            ("capa_entrada", config.input_size, stored.capa_entrada),
            ("capa_oculta", config.hidden_size, stored.capa_oculta),
            ("capa_salida", config.output_size, stored.capa_salida),
        ];
        for (name, current, in_file) in sizes {
            if current == in_file {
                continue;
            }
            match policy {
                LoadPolicy::Strict => return Err(NetError::mismatch(name, current, in_file)),
                LoadPolicy::Adapt => warn!(
                    layer = name,
                    configured = current,
                    in_file,
                    "weights file layer size differs from configuration; using the file's size"
                ),
            }
        }

        config.input_size = stored.capa_entrada;
        config.hidden_size = stored.capa_oculta;
        config.output_size = stored.capa_salida;
        config.activations = stored.funciones_activacion;
        config.leaky_slope = stored.beta_leaky_relu;

        *self = assemble(path, config, doc)?;
        info!(path = %path.display(), bias = self.config().bias, "loaded network weights");
        Ok(())
    }

    /// Builds a network entirely from a weights file, including the training
    /// hyper-parameters it was saved with (or `NetworkConfig::new` defaults when
    /// the file predates them).
    pub fn from_weights_file(path: impl AsRef<Path>) -> Result<Network> {
        let path = path.as_ref();
        let doc = read_weights_file(path)?;
        let stored = &doc.config;

        let mut config = NetworkConfig::new(stored.capa_entrada, stored.capa_oculta, stored.capa_salida)
            .with_activations(stored.funciones_activacion[0], stored.funciones_activacion[1])
            .with_leaky_slope(stored.beta_leaky_relu);
        if let Some(alfa) = stored.alfa {
            config.learning_rate = alfa;
        }
        if let Some(max_epocas) = stored.max_epocas {
            config.max_epochs = max_epocas;
        }
        if let Some(precision) = stored.precision {
            config.precision = precision;
        }
        config.momentum = stored.momentum.unwrap_or(false);
        config.momentum_beta = stored.beta.unwrap_or(0.0);

        assemble(path, config, doc)
    }
}

fn read_weights_file(path: &Path) -> Result<WeightsFile> {
    let text = std::fs::read_to_string(path).map_err(|e| NetError::io(path, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| NetError::malformed(path, e))?;
    if let Some(config) = value.get("config") {
        check_activation_ids(config)?;
    }
    serde_json::from_value(value).map_err(|e| NetError::malformed(path, e))
}

/// Checks the document's matrices against its own config and builds the network.
fn assemble(path: &Path, mut config: NetworkConfig, doc: WeightsFile) -> Result<Network> {
    config.bias = match (&doc.t_hidden, &doc.t_output) {
        (Some(_), Some(_)) => true,
        (None, None) => false,
        _ => return Err(NetError::malformed(path, "only one of Th/To is present")),
    };

    Network::from_parts(config, doc.w_hidden, doc.w_output, doc.t_hidden, doc.t_output).map_err(
        |e| match e {
            NetError::DimensionMismatch { what, expected, got } => NetError::malformed(
                path,
                format!("{} has size {} but the stored config implies {}", what, got, expected),
            ),
            other => other,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::io::Write;

    fn network(config: NetworkConfig, seed: u64) -> Network {
        Network::with_rng(config, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let config = NetworkConfig::new(3, 4, 2)
            .with_activations(ActivationFunction::Tanh, ActivationFunction::Softmax);

        let saved = network(config.clone(), 1);
        saved.save_weights(&path).unwrap();

        let mut loaded = network(config, 2);
        assert_ne!(loaded, saved);
        loaded.load_weights(&path, LoadPolicy::Strict).unwrap();
        assert_eq!(loaded, saved);

        let input = [0.3, -1.2, 0.7];
        assert_eq!(loaded.predict(&input).unwrap(), saved.predict(&input).unwrap());
    }

    #[test]
    fn document_uses_fixed_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        network(NetworkConfig::new(2, 3, 1), 3).save_weights(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let w_h = value["W_h"].as_array().unwrap();
        assert_eq!(w_h.len(), 3);
        assert!(w_h.iter().all(|row| row.as_array().unwrap().len() == 2));
        assert_eq!(value["W_o"].as_array().unwrap().len(), 1);
        assert_eq!(value["Th"].as_array().unwrap().len(), 3);
        assert_eq!(value["To"].as_array().unwrap().len(), 1);
        assert_eq!(value["config"]["capa_entrada"], 2);
        assert_eq!(value["config"]["capa_oculta"], 3);
        assert_eq!(value["config"]["capa_salida"], 1);
        assert_eq!(value["config"]["funciones_activacion"][0], "sigmoide");
        assert!(value["config"]["beta_leaky_relu"].is_number());
    }

    #[test]
    fn missing_bias_vectors_disable_bias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        network(NetworkConfig::new(2, 2, 1).with_bias(false), 4)
            .save_weights(&path)
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\"Th\""));

        let mut net = network(NetworkConfig::new(2, 2, 1), 5);
        assert!(net.config().bias);
        net.load_weights(&path, LoadPolicy::Strict).unwrap();
        assert!(!net.config().bias);
        assert!(net.hidden_bias().is_none());
    }

    #[test]
    fn strict_policy_rejects_other_sizes_and_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        network(NetworkConfig::new(2, 5, 1), 6).save_weights(&path).unwrap();

        let mut net = network(NetworkConfig::new(2, 3, 1), 7);
        let before = net.clone();
        match net.load_weights(&path, LoadPolicy::Strict) {
            Err(NetError::DimensionMismatch { what, expected, got }) => {
                assert_eq!(what, "capa_oculta");
                assert_eq!((expected, got), (3, 5));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(net, before);
    }

    #[test]
    fn adapt_policy_reshapes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let saved = network(NetworkConfig::new(2, 5, 3), 8);
        saved.save_weights(&path).unwrap();

        let mut net = network(NetworkConfig::new(2, 3, 1).with_learning_rate(0.7), 9);
        net.load_weights(&path, LoadPolicy::Adapt).unwrap();
        assert_eq!(net.config().hidden_size, 5);
        assert_eq!(net.config().output_size, 3);
        assert_eq!(net.config().learning_rate, 0.7);
        assert_eq!(net.hidden_weights(), saved.hidden_weights());
        assert_eq!(net.predict(&[1.0, 0.0]).unwrap().len(), 3);
    }

    #[test]
    fn legacy_minimal_document_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"W_h": [[0.1, 0.2], [0.3, 0.4]], "W_o": [[0.5, 0.6]],
                "config": {{"capa_entrada": 2, "capa_oculta": 2, "capa_salida": 1,
                            "funciones_activacion": ["lineal", "lineal"], "beta_leaky_relu": 0.01}}}}"#
        )
        .unwrap();

        let net = Network::from_weights_file(file.path()).unwrap();
        assert!(!net.config().bias);
        assert_eq!(net.config().hidden_activation(), ActivationFunction::Linear);
        // [0.1+0.2, 0.3+0.4] -> 0.5*0.3 + 0.6*0.7
        let out = net.predict(&[1.0, 1.0]).unwrap();
        approx::assert_abs_diff_eq!(out[0], 0.57, epsilon = 1e-12);
    }

    #[test]
    fn inconsistent_document_is_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"W_h": [[0.1, 0.2]], "W_o": [[0.5, 0.6]],
                "config": {{"capa_entrada": 2, "capa_oculta": 2, "capa_salida": 1,
                            "funciones_activacion": ["sigmoide", "sigmoide"], "beta_leaky_relu": 0.01}}}}"#
        )
        .unwrap();

        let res = Network::from_weights_file(file.path());
        assert!(matches!(res, Err(NetError::Malformed { .. })));
    }

    #[test]
    fn unknown_activation_in_weights_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"W_h": [[0.1]], "W_o": [[0.5]],
                "config": {{"capa_entrada": 1, "capa_oculta": 1, "capa_salida": 1,
                            "funciones_activacion": ["sigmoide", "elu"], "beta_leaky_relu": 0.01}}}}"#
        )
        .unwrap();

        let res = Network::from_weights_file(file.path());
        assert!(matches!(res, Err(NetError::UnknownActivation(ref id)) if id == "elu"));
    }

    #[test]
    fn unreadable_and_unwritable_paths_are_io_failures() {
        let mut net = network(NetworkConfig::new(1, 1, 1), 10);
        assert!(matches!(
            net.load_weights("/no/such/weights.json", LoadPolicy::Strict),
            Err(NetError::Io { .. })
        ));
        assert!(matches!(
            net.save_weights("/no/such/dir/weights.json"),
            Err(NetError::Io { .. })
        ));
    }
}
