use std::path::PathBuf;

/// Errors raised by the network engine and its data loaders.
///
/// Every variant is returned to the immediate caller; nothing in the crate
/// retries or swallows these.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// A hyper-parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Training data is missing, empty or has inconsistent vector lengths.
    #[error("invalid training input: {0}")]
    InvalidTrainingInput(String),

    /// A vector or persisted layer size disagrees with the configured network shape.
    #[error("dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    /// An activation identifier that is not in the registry.
    #[error("unknown activation function '{0}'")]
    UnknownActivation(String),

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was readable but its contents could not be interpreted.
    #[error("malformed document {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("could not decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The epoch error became NaN or infinite.
    #[error("numeric failure: epoch {epoch} produced a non-finite error")]
    NumericFailure { epoch: usize },

    /// A second training run was requested while one is still active.
    #[error("a training run is already in progress")]
    TrainingInProgress,
}

pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NetError::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        NetError::Malformed { path: path.into(), reason: reason.to_string() }
    }

    pub(crate) fn mismatch(what: impl Into<String>, expected: usize, got: usize) -> Self {
        NetError::DimensionMismatch { what: what.into(), expected, got }
    }
}
