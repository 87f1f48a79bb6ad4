pub mod math;
pub mod activation;
pub mod network;
pub mod train;
pub mod data;
pub mod metrics;
pub mod error;
pub mod logging;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use network::config::NetworkConfig;
pub use network::network::{ForwardPass, Network};
pub use network::persist::LoadPolicy;
pub use train::epoch_stats::{EpochStats, TrainingEvent};
pub use train::observer::{on_epoch, TrainingObserver};
pub use train::shared::SharedNetwork;
pub use train::trainer::{accuracy, StopReason, TrainOptions, TrainingReport};
pub use data::Dataset;
pub use metrics::confusion::ConfusionMatrix;
pub use error::{NetError, Result};
