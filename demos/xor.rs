use backprop_lab::{on_epoch, ActivationFunction, EpochStats, Network, NetworkConfig};
use rand::{rngs::StdRng, SeedableRng};

fn main() -> backprop_lab::Result<()> {
    let inputs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let expected_outputs = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];

    let config = NetworkConfig::new(2, 2, 1)
        .with_learning_rate(0.5)
        .with_max_epochs(5000)
        .with_precision(0.001)
        .with_activations(ActivationFunction::Sigmoid, ActivationFunction::Sigmoid);

    // A 2-2-1 net occasionally settles in a local minimum; try a few seeds.
    for seed in 0..20u64 {
        let mut network = Network::with_rng(config.clone(), &mut StdRng::seed_from_u64(seed))?;
        let report = network.train(
            &inputs,
            &expected_outputs,
            on_epoch(|s: &EpochStats| {
                if s.epoch % 1000 == 0 {
                    println!("Epoch {}: error = {:.6}", s.epoch, s.error);
                }
            }),
        )?;

        println!(
            "seed {seed}: {:?} after {} epochs, error {:.6}",
            report.stop_reason,
            report.epochs(),
            report.final_error().unwrap_or(f64::NAN)
        );
        if report.final_error().is_some_and(|e| e <= 0.01) {
            println!("\nPredictions after training:");
            for input in &inputs {
                let output = network.predict(input)?;
                println!("  {:?} -> {:.4}", input, output[0]);
            }
            break;
        }
    }
    Ok(())
}
