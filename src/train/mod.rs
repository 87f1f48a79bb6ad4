pub mod backprop;
pub mod epoch_stats;
pub mod observer;
pub mod shared;
pub mod trainer;

pub use epoch_stats::{EpochStats, TrainingEvent};
pub use observer::{on_epoch, TrainingObserver};
pub use shared::SharedNetwork;
pub use trainer::{accuracy, train, StopReason, TrainOptions, TrainingReport};
