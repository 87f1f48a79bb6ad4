use std::sync::mpsc;

use crate::train::epoch_stats::{EpochStats, TrainingEvent};
use crate::train::trainer::TrainingReport;

/// Receives training progress. Called synchronously from the training loop:
/// `on_epoch` once per completed epoch, `on_complete` once when the run ends
/// without error.
pub trait TrainingObserver {
    fn on_epoch(&mut self, _stats: &EpochStats) {}

    fn on_complete(&mut self, _report: &TrainingReport) {}
}

/// Ignores every event.
impl TrainingObserver for () {}

/// Forwards events to a channel. A dropped receiver does not stop training.
impl TrainingObserver for mpsc::Sender<TrainingEvent> {
    fn on_epoch(&mut self, stats: &EpochStats) {
        let _ = self.send(TrainingEvent::Epoch(stats.clone()));
    }

    fn on_complete(&mut self, report: &TrainingReport) {
        let _ = self.send(TrainingEvent::Complete(report.clone()));
    }
}

impl<T: TrainingObserver + ?Sized> TrainingObserver for &mut T {
    fn on_epoch(&mut self, stats: &EpochStats) {
        (**self).on_epoch(stats)
    }

    fn on_complete(&mut self, report: &TrainingReport) {
        (**self).on_complete(report)
    }
}

/// Observer backed by a per-epoch closure; see [`on_epoch`].
pub struct EpochFn<F>(F);

impl<F: FnMut(&EpochStats)> TrainingObserver for EpochFn<F> {
    fn on_epoch(&mut self, stats: &EpochStats) {
        (self.0)(stats)
    }
}

/// Wraps a closure called with every epoch's stats.
pub fn on_epoch<F: FnMut(&EpochStats)>(f: F) -> EpochFn<F> {
    EpochFn(f)
}
