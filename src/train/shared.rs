use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::error::{NetError, Result};
use crate::network::network::Network;
use crate::network::persist::LoadPolicy;
use crate::train::observer::TrainingObserver;
use crate::train::trainer::{run, TrainOptions, TrainingReport};

/// A network shared between a front end and a background training thread.
///
/// At most one training run is active at a time. Training works on a private
/// copy and publishes its weights after every epoch, so `predict` and
/// `snapshot` issued mid-run always see the weights of a completed epoch,
/// never a half-applied update.
#[derive(Debug, Clone)]
pub struct SharedNetwork {
    inner: Arc<RwLock<Network>>,
    training: Arc<AtomicBool>,
}

/// Holds the "training in progress" flag; clears it on drop, including when
/// the run fails or panics.
struct TrainingGuard {
    flag: Arc<AtomicBool>,
}

impl TrainingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<TrainingGuard> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| NetError::TrainingInProgress)?;
        Ok(TrainingGuard { flag: Arc::clone(flag) })
    }
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SharedNetwork {
    pub fn new(network: Network) -> SharedNetwork {
        SharedNetwork {
            inner: Arc::new(RwLock::new(network)),
            training: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    /// Copy of the current network.
    pub fn snapshot(&self) -> Network {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).predict(input)
    }

    pub fn predict_batch(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).predict_batch(inputs)
    }

    /// Swaps in a different network. Refused while training.
    pub fn replace(&self, network: Network) -> Result<()> {
        let _guard = TrainingGuard::acquire(&self.training)?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = network;
        Ok(())
    }

    /// Loads a weights file into the shared network. Refused while training.
    pub fn load_weights(&self, path: impl AsRef<Path>, policy: LoadPolicy) -> Result<()> {
        let _guard = TrainingGuard::acquire(&self.training)?;
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .load_weights(path, policy)
    }

    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).save_weights(path)
    }

    /// Trains on the calling thread. Fails with `TrainingInProgress` if another
    /// run is active.
    pub fn train<O: TrainingObserver>(
        &self,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        observer: O,
        options: &TrainOptions,
    ) -> Result<TrainingReport> {
        let guard = TrainingGuard::acquire(&self.training)?;
        self.train_guarded(guard, inputs, targets, observer, options)
    }

    /// Starts training on a background thread. The in-progress check happens
    /// before the thread is spawned, so a second call fails immediately.
    pub fn spawn_training<O>(
        &self,
        inputs: Vec<Vec<f64>>,
        targets: Vec<Vec<f64>>,
        observer: O,
        options: TrainOptions,
    ) -> Result<JoinHandle<Result<TrainingReport>>>
    where
        O: TrainingObserver + Send + 'static,
    {
        let guard = TrainingGuard::acquire(&self.training)?;
        let shared = self.clone();
        Ok(thread::spawn(move || {
            shared.train_guarded(guard, &inputs, &targets, observer, &options)
        }))
    }

    fn train_guarded<O: TrainingObserver>(
        &self,
        _guard: TrainingGuard,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        mut observer: O,
        options: &TrainOptions,
    ) -> Result<TrainingReport> {
        let mut working = self.snapshot();
        let mut publish = |net: &Network| {
            self.inner
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .copy_weights_from(net);
        };
        run(&mut working, inputs, targets, &mut observer, options, &mut publish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::config::NetworkConfig;
    use crate::train::epoch_stats::EpochStats;
    use crate::train::observer::on_epoch;
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::mpsc;

    fn shared(seed: u64) -> SharedNetwork {
        let config = NetworkConfig::new(2, 3, 1).with_max_epochs(200).with_precision(0.0);
        SharedNetwork::new(Network::with_rng(config, &mut StdRng::seed_from_u64(seed)).unwrap())
    }

    fn or_gate() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        (
            vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            vec![vec![0.0], vec![1.0], vec![1.0], vec![1.0]],
        )
    }

    #[test]
    fn second_run_is_refused_while_first_is_active() {
        let net = shared(1);
        let (inputs, targets) = or_gate();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let mut first = true;
        let observer = on_epoch(move |_: &EpochStats| {
            if first {
                first = false;
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            }
        });
        let handle = net
            .spawn_training(inputs.clone(), targets.clone(), observer, TrainOptions::default())
            .unwrap();

        started_rx.recv().unwrap();
        assert!(net.is_training());
        assert!(matches!(
            net.spawn_training(inputs, targets, (), TrainOptions::default()),
            Err(NetError::TrainingInProgress)
        ));
        assert!(matches!(net.replace(net.snapshot()), Err(NetError::TrainingInProgress)));
        // Reads stay available mid-run.
        assert_eq!(net.predict(&[1.0, 0.0]).unwrap().len(), 1);

        release_tx.send(()).unwrap();
        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.epochs(), 200);
        assert!(!net.is_training());
    }

    #[test]
    fn published_weights_match_trained_network() {
        let net = shared(2);
        let start = net.snapshot();
        let (inputs, targets) = or_gate();

        let mut standalone = start.clone();
        let expected = standalone.train(&inputs, &targets, ()).unwrap();
        let report = net.train(&inputs, &targets, (), &TrainOptions::default()).unwrap();

        assert_eq!(report, expected);
        assert_eq!(net.snapshot(), standalone);
    }

    #[test]
    fn flag_is_cleared_after_failed_run() {
        let net = shared(3);
        let res = net.train(&[], &[], (), &TrainOptions::default());
        assert!(matches!(res, Err(NetError::InvalidTrainingInput(_))));
        assert!(!net.is_training());
        assert!(net.replace(net.snapshot()).is_ok());
    }
}
