use std::error::Error;
use std::path::PathBuf;
use std::sync::mpsc;

use backprop_lab::data::{load_patterns, vowels, Dataset, Vowel};
use backprop_lab::logging::init_logging;
use backprop_lab::metrics::class_of;
use backprop_lab::{
    ActivationFunction, ConfusionMatrix, LoadPolicy, Network, NetworkConfig, SharedNetwork,
    TrainOptions, TrainingEvent, TrainingReport,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;

/// Two-layer backpropagation network trainer.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train on a pattern file (`x1 x2 | y1 y2` per line)
    Train {
        #[arg(short, long, value_name = "PATH")]
        data: PathBuf,
        #[command(flatten)]
        hyper: HyperArgs,
    },
    /// Run one input through a saved network
    Predict {
        #[arg(short, long, value_name = "PATH")]
        weights: PathBuf,
        /// Whitespace-separated input values
        #[arg(short, long)]
        input: String,
        /// Network shape to load the weights into; defaults to the file's own
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Adopt the file's layer sizes when they differ from `--config`
        #[arg(long)]
        adapt: bool,
    },
    /// Vowel image recognition
    Vowels {
        #[command(subcommand)]
        command: VowelCommand,
    },
}

#[derive(Subcommand)]
enum VowelCommand {
    /// Normalise a directory of vowel images into a dataset file
    Normalize {
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
        #[arg(long, value_name = "PATH")]
        out: PathBuf,
    },
    /// Train a five-output network on a normalised dataset
    Train {
        #[arg(short, long, value_name = "PATH")]
        data: PathBuf,
        #[command(flatten)]
        hyper: HyperArgs,
    },
    /// Classify one image with a trained vowel network
    Classify {
        #[arg(short, long, value_name = "PATH")]
        weights: PathBuf,
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
    },
}

/// Hyper-parameters shared by the training commands. Flags override `--config`.
#[derive(Args)]
struct HyperArgs {
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Hidden layer size; defaults to floor(sqrt(n * m))
    #[arg(long, value_name = "INT")]
    hidden: Option<usize>,
    #[arg(long, value_name = "FLOAT")]
    alfa: Option<f64>,
    #[arg(long, value_name = "INT")]
    epochs: Option<usize>,
    #[arg(long, value_name = "FLOAT")]
    precision: Option<f64>,
    #[arg(long, value_name = "ID")]
    hidden_activation: Option<ActivationFunction>,
    #[arg(long, value_name = "ID")]
    output_activation: Option<ActivationFunction>,
    #[arg(long, value_name = "FLOAT")]
    leaky_slope: Option<f64>,
    /// Enable momentum with this beta
    #[arg(long, value_name = "BETA")]
    momentum: Option<f64>,
    #[arg(long)]
    no_bias: bool,
    /// Where to save the trained weights
    #[arg(short, long, value_name = "PATH")]
    weights: Option<PathBuf>,
}

impl HyperArgs {
    fn config_for(&self, input_size: usize, output_size: usize) -> Result<NetworkConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => NetworkConfig::load_json(path)?,
            None => NetworkConfig::new(
                input_size,
                NetworkConfig::suggested_hidden_size(input_size, output_size),
                output_size,
            ),
        };
        config.input_size = input_size;
        config.output_size = output_size;

        if let Some(l) = self.hidden {
            config.hidden_size = l;
        }
        if let Some(a) = self.alfa {
            config.learning_rate = a;
        }
        if let Some(e) = self.epochs {
            config.max_epochs = e;
        }
        if let Some(p) = self.precision {
            config.precision = p;
        }
        if let Some(f) = self.hidden_activation {
            config.activations[0] = f;
        }
        if let Some(f) = self.output_activation {
            config.activations[1] = f;
        }
        if let Some(b) = self.leaky_slope {
            config.leaky_slope = b;
        }
        if let Some(beta) = self.momentum {
            config = config.with_momentum(beta);
        }
        if self.no_bias {
            config.bias = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Train { data, hyper } => {
            let dataset = load_patterns(&data)?;
            train_and_report(&dataset, &hyper, None)?;
        }
        Command::Predict { weights, input, config, adapt } => {
            let values = parse_input(&input)?;
            let network = match config {
                Some(path) => {
                    let policy = if adapt { LoadPolicy::Adapt } else { LoadPolicy::Strict };
                    let mut network = Network::new(NetworkConfig::load_json(path)?)?;
                    network.load_weights(&weights, policy)?;
                    network
                }
                None => Network::from_weights_file(&weights)?,
            };
            let output = network.predict(&values)?;
            println!("{}", format_vector(&output));
            if output.len() == 1 {
                println!("class: {}", class_of(&output));
            }
        }
        Command::Vowels { command } => vowel_command(command)?,
    }
    Ok(())
}

fn vowel_command(command: VowelCommand) -> Result<(), Box<dyn Error>> {
    match command {
        VowelCommand::Normalize { dir, out } => {
            let count = vowels::normalize_directory(&dir, &out)?;
            println!("wrote {} samples to {}", count, out.display());
        }
        VowelCommand::Train { data, hyper } => {
            let dataset = vowels::read_dataset(&data)?;
            train_and_report(&dataset, &hyper, Some(Vowel::labels()))?;
        }
        VowelCommand::Classify { weights, image } => {
            let network = Network::from_weights_file(&weights)?;
            let img = vowels::normalize_image(&image)?;
            let prediction = vowels::classify_vowel(&network, &img.features())?;
            let balance = img.color_balance();

            println!("vowel: {} ({:.2}%)", prediction.vowel, prediction.confidence());
            for (vowel, pct) in &prediction.activations {
                println!("  {}: {:6.2}%", vowel, pct);
            }
            println!(
                "dominant colour: {:?} (R {:.1}%, G {:.1}%, B {:.1}%)",
                balance.dominant, balance.red_pct, balance.green_pct, balance.blue_pct
            );
        }
    }
    Ok(())
}

/// Trains on a background thread, printing progress from the event channel,
/// then prints the confusion matrix and saves the weights if asked.
fn train_and_report(
    dataset: &Dataset,
    hyper: &HyperArgs,
    labels: Option<Vec<String>>,
) -> Result<TrainingReport, Box<dyn Error>> {
    let config = hyper.config_for(dataset.input_size(), dataset.output_size())?;
    info!(
        n = config.input_size,
        l = config.hidden_size,
        m = config.output_size,
        samples = dataset.len(),
        "building network"
    );
    let shared = SharedNetwork::new(Network::new(config)?);

    let (tx, rx) = mpsc::channel();
    let handle = shared.spawn_training(
        dataset.inputs.clone(),
        dataset.targets.clone(),
        tx,
        TrainOptions::default(),
    )?;

    for event in rx {
        match event {
            TrainingEvent::Epoch(stats) => {
                if stats.epoch == 1 || stats.epoch % 100 == 0 {
                    println!("epoch {:>6}/{}  error {:.6}", stats.epoch, stats.max_epochs, stats.error);
                }
            }
            TrainingEvent::Complete(report) => {
                println!(
                    "finished after {} epochs ({:?}), error {:.6}",
                    report.epochs(),
                    report.stop_reason,
                    report.final_error().unwrap_or(f64::NAN)
                );
            }
        }
    }

    let report = handle.join().map_err(|_| "training thread panicked")??;

    let network = shared.snapshot();
    let mut confusion = ConfusionMatrix::evaluate(&network, dataset)?;
    if let Some(labels) = labels {
        confusion = confusion.with_labels(labels);
    }
    println!("{}", confusion);

    if let Some(path) = &hyper.weights {
        shared.save_weights(path)?;
        println!("weights saved to {}", path.display());
    }
    Ok(report)
}

fn parse_input(text: &str) -> Result<Vec<f64>, Box<dyn Error>> {
    text.split_whitespace()
        .map(|tok| tok.parse::<f64>().map_err(|_| format!("'{}' is not a number", tok).into()))
        .collect()
}

fn format_vector(values: &[f64]) -> String {
    values.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" ")
}
