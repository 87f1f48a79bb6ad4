use serde::{Deserialize, Serialize};

use crate::train::trainer::TrainingReport;

/// Per-epoch training statistics emitted by the training loop.
///
/// Exactly one `EpochStats` is produced at the end of every completed epoch.
/// Receivers (a progress bar, a log line, a chart) use it to follow training
/// without touching the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// `max_epocas` of this run.
    pub max_epochs: usize,
    /// Mean per-sample error `0.5 * Σ (t - a)²` over the epoch.
    pub error: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Messages sent over a progress channel.
#[derive(Debug, Clone)]
pub enum TrainingEvent {
    Epoch(EpochStats),
    Complete(TrainingReport),
}
