use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{NetError, Result};
use crate::math::matrix::{argmax, Matrix};
use crate::network::config::NetworkConfig;
use crate::network::network::Network;
use crate::train::backprop::{backward, sample_error, Momentum};
use crate::train::epoch_stats::EpochStats;
use crate::train::observer::TrainingObserver;

/// Optional controls for a training run.
///
/// - `stop_flag`: when set to `true` from another thread, the loop ends at
///   the next epoch boundary with `StopReason::Stopped`.
#[derive(Debug, Clone, Default)]
pub struct TrainOptions {
    pub stop_flag: Option<Arc<AtomicBool>>,
}

/// Why the training loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// An epoch's error reached `precision`.
    Converged,
    /// `max_epocas` epochs completed without converging.
    MaxEpochsReached,
    /// The stop flag was raised.
    Stopped,
}

/// Outcome of one `train()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Mean error of every completed epoch, in order.
    pub error_history: Vec<f64>,
    /// Percentage of samples whose output argmax matches the target argmax,
    /// measured after the last epoch.
    pub accuracy: f64,
    pub stop_reason: StopReason,
}

impl TrainingReport {
    pub fn epochs(&self) -> usize {
        self.error_history.len()
    }

    pub fn final_error(&self) -> Option<f64> {
        self.error_history.last().copied()
    }
}

/// State of a run in progress; dropped when `train` returns.
struct TrainingRun {
    epoch: usize,
    error: f64,
    history: Vec<f64>,
    momentum: Option<Momentum>,
}

impl TrainingRun {
    fn new(network: &Network) -> TrainingRun {
        let config = network.config();
        TrainingRun {
            epoch: 0,
            error: f64::INFINITY,
            history: Vec::new(),
            momentum: config
                .momentum
                .then(|| Momentum::new(network, config.momentum_beta)),
        }
    }
}

impl Network {
    /// Trains with online backpropagation until the epoch error reaches
    /// `precision` or `max_epocas` epochs have run.
    ///
    /// `inputs[i]` (length `n`) is paired with `targets[i]` (length `m`).
    /// Invalid sample data is rejected before any weight changes.
    pub fn train<O: TrainingObserver>(
        &mut self,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        observer: O,
    ) -> Result<TrainingReport> {
        train(self, inputs, targets, observer, &TrainOptions::default())
    }
}

/// Training entry point with explicit options.
pub fn train<O: TrainingObserver>(
    network: &mut Network,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
    mut observer: O,
    options: &TrainOptions,
) -> Result<TrainingReport> {
    run(network, inputs, targets, &mut observer, options, &mut |_| {})
}

/// The training loop. `after_epoch` sees the network after every completed
/// epoch, before the observer is notified.
pub(crate) fn run(
    network: &mut Network,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
    observer: &mut dyn TrainingObserver,
    options: &TrainOptions,
    after_epoch: &mut dyn FnMut(&Network),
) -> Result<TrainingReport> {
    validate_samples(network.config(), inputs, targets)?;
    let config = network.config().clone();

    let columns: Vec<(Matrix, Matrix)> = inputs
        .iter()
        .zip(targets.iter())
        .map(|(x, t)| (Matrix::column(x), Matrix::column(t)))
        .collect();
    let sample_count = columns.len() as f64;

    let mut state = TrainingRun::new(network);
    info!(
        samples = columns.len(),
        max_epochs = config.max_epochs,
        precision = config.precision,
        alfa = config.learning_rate,
        momentum = config.momentum,
        "training started"
    );

    let stop_reason = loop {
        if stop_requested(options) {
            break StopReason::Stopped;
        }

        let started = Instant::now();
        let mut total_error = 0.0;
        for ((x, t), target) in columns.iter().zip(targets.iter()) {
            let pass = network.forward_column(x);
            total_error += sample_error(target, &pass.a_output.to_column_vec());
            backward(network, x, t, &pass, state.momentum.as_mut());
        }

        state.epoch += 1;
        state.error = total_error / sample_count;
        if !state.error.is_finite() {
            return Err(NetError::NumericFailure { epoch: state.epoch });
        }
        state.history.push(state.error);

        after_epoch(network);
        observer.on_epoch(&EpochStats {
            epoch: state.epoch,
            max_epochs: config.max_epochs,
            error: state.error,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        if state.epoch % 100 == 0 {
            debug!(epoch = state.epoch, error = state.error, "epoch completed");
        }

        if state.error <= config.precision {
            break StopReason::Converged;
        }
        if state.epoch >= config.max_epochs {
            break StopReason::MaxEpochsReached;
        }
    };

    let accuracy = accuracy(network, inputs, targets)?;
    info!(
        epochs = state.epoch,
        error = state.error,
        accuracy,
        reason = ?stop_reason,
        "training finished"
    );

    let report = TrainingReport {
        error_history: state.history,
        accuracy,
        stop_reason,
    };
    observer.on_complete(&report);
    Ok(report)
}

/// Percentage (0–100) of samples whose predicted argmax equals the target's.
/// An empty set scores 0.
pub fn accuracy(network: &Network, inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64> {
    if inputs.is_empty() {
        return Ok(0.0);
    }
    let mut matches = 0usize;
    for (input, target) in inputs.iter().zip(targets.iter()) {
        if argmax(&network.predict(input)?) == argmax(target) {
            matches += 1;
        }
    }
    Ok(matches as f64 / inputs.len() as f64 * 100.0)
}

fn stop_requested(options: &TrainOptions) -> bool {
    options
        .stop_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn validate_samples(config: &NetworkConfig, inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<()> {
    if inputs.is_empty() {
        return Err(NetError::InvalidTrainingInput("no training samples".into()));
    }
    if inputs.len() != targets.len() {
        return Err(NetError::InvalidTrainingInput(format!(
            "{} input vectors but {} target vectors",
            inputs.len(),
            targets.len()
        )));
    }
    for (i, (input, target)) in inputs.iter().zip(targets.iter()).enumerate() {
        if input.len() != config.input_size {
            return Err(NetError::InvalidTrainingInput(format!(
                "sample {}: input has {} values, expected {}",
                i,
                input.len(),
                config.input_size
            )));
        }
        if target.len() != config.output_size {
            return Err(NetError::InvalidTrainingInput(format!(
                "sample {}: target has {} values, expected {}",
                i,
                target.len(),
                config.output_size
            )));
        }
        if input.iter().chain(target.iter()).any(|v| !v.is_finite()) {
            return Err(NetError::InvalidTrainingInput(format!(
                "sample {}: contains a non-finite value",
                i
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::train::observer::on_epoch;
    use rand::{rngs::StdRng, SeedableRng};

    fn network(config: NetworkConfig) -> Network {
        Network::with_rng(config, &mut StdRng::seed_from_u64(11)).unwrap()
    }

    fn and_gate() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        (
            vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        )
    }

    #[test]
    fn rejects_bad_samples_without_touching_weights() {
        let mut net = network(NetworkConfig::new(2, 2, 1));
        let before = net.clone();

        let cases: Vec<(Vec<Vec<f64>>, Vec<Vec<f64>>)> = vec![
            (vec![], vec![]),
            (vec![vec![0.0, 1.0]], vec![]),
            (vec![vec![0.0, 1.0, 2.0]], vec![vec![1.0]]),
            (vec![vec![0.0, 1.0]], vec![vec![1.0, 0.0]]),
            (vec![vec![0.0, f64::NAN]], vec![vec![1.0]]),
        ];
        for (inputs, targets) in cases {
            let res = net.train(&inputs, &targets, ());
            assert!(matches!(res, Err(NetError::InvalidTrainingInput(_))), "{:?}", res);
        }
        assert_eq!(net, before);
    }

    #[test]
    fn callback_runs_once_per_epoch() {
        let config = NetworkConfig::new(2, 3, 2).with_max_epochs(25).with_precision(0.0);
        let mut net = network(config);
        let (inputs, targets) = and_gate();

        let mut seen = Vec::new();
        let report = net
            .train(&inputs, &targets, on_epoch(|s: &EpochStats| seen.push((s.epoch, s.error))))
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::MaxEpochsReached);
        assert_eq!(report.epochs(), 25);
        assert_eq!(seen.len(), 25);
        for (i, (epoch, error)) in seen.iter().enumerate() {
            assert_eq!(*epoch, i + 1);
            assert_eq!(*error, report.error_history[i]);
        }
    }

    #[test]
    fn stops_at_first_epoch_under_precision() {
        // Any error is <= a huge precision, so the first epoch converges.
        let config = NetworkConfig::new(2, 3, 2).with_precision(1e9).with_max_epochs(50);
        let mut net = network(config);
        let (inputs, targets) = and_gate();
        let report = net.train(&inputs, &targets, ()).unwrap();
        assert_eq!(report.stop_reason, StopReason::Converged);
        assert_eq!(report.epochs(), 1);
    }

    #[test]
    fn raised_stop_flag_halts_before_first_epoch() {
        let mut net = network(NetworkConfig::new(2, 3, 2));
        let before = net.clone();
        let (inputs, targets) = and_gate();
        let options = TrainOptions { stop_flag: Some(Arc::new(AtomicBool::new(true))) };
        let report = train(&mut net, &inputs, &targets, (), &options).unwrap();
        assert_eq!(report.stop_reason, StopReason::Stopped);
        assert!(report.error_history.is_empty());
        assert_eq!(net, before);
    }

    #[test]
    fn momentum_training_learns_and_gate() {
        let config = NetworkConfig::new(2, 3, 2)
            .with_learning_rate(0.3)
            .with_momentum(0.5)
            .with_max_epochs(5000)
            .with_precision(0.005);
        let mut net = network(config);
        let (inputs, targets) = and_gate();
        let report = net.train(&inputs, &targets, ()).unwrap();
        assert_eq!(report.stop_reason, StopReason::Converged);
        assert_eq!(report.accuracy, 100.0);
    }

    #[test]
    fn diverging_training_is_a_numeric_failure() {
        let config = NetworkConfig::new(1, 1, 1)
            .with_bias(false)
            .with_learning_rate(1e6)
            .with_max_epochs(100)
            .with_precision(0.0)
            .with_activations(ActivationFunction::Linear, ActivationFunction::Linear);
        let mut net = network(config);
        let res = net.train(&[vec![10.0]], &[vec![-10.0]], ());
        assert!(matches!(res, Err(NetError::NumericFailure { .. })), "{:?}", res);
    }

    #[test]
    fn accuracy_is_a_percentage() {
        let net = network(NetworkConfig::new(2, 3, 2));
        let (inputs, targets) = and_gate();
        let acc = accuracy(&net, &inputs, &targets).unwrap();
        assert!((0.0..=100.0).contains(&acc));
        assert_eq!(acc % 25.0, 0.0);
    }
}
