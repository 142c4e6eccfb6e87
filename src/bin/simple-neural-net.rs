use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use simple_neural_net::idx::{self, Dataset};
use simple_neural_net::{persist, CostKind, Network, Trainer, TrainingConfig};

#[derive(Parser)]
#[command(about = "Train and evaluate a sigmoid network on MNIST digits", long_about = None)]
struct Options {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a new network on the MNIST training set, report its accuracy
    /// on the test set, and save it
    Train(TrainOptions),

    /// Report a saved network's accuracy on the MNIST test set
    Test(TestOptions),
}

#[derive(clap::Args)]
struct TrainOptions {
    /// Directory holding the four MNIST IDX files
    #[arg(long = "data", value_name = "DIR")]
    data_dir: PathBuf,

    /// Sizes of the hidden layers, comma separated
    #[arg(long, value_name = "N,...", value_delimiter = ',', default_values_t = [100])]
    hidden: Vec<usize>,

    /// Passes over the training data
    #[arg(long, default_value_t = 30)]
    epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 3.0)]
    eta: f64,

    /// L2 regularization parameter
    #[arg(long, default_value_t = 5.0)]
    lambda: f64,

    /// Samples per gradient step
    #[arg(long = "mini-batch-size", value_name = "N", default_value_t = 10)]
    mini_batch_size: usize,

    #[arg(long, value_enum, default_value_t = CostKind::Quadratic)]
    cost: CostKind,

    /// Number of training images to draw, split between training and validation
    #[arg(long = "training-size", value_name = "N", default_value_t = 60_000)]
    training_size: usize,

    /// Fraction of the drawn images held out for validation, strictly
    /// between 0 and 1
    #[arg(long = "validation-fraction", default_value_t = 0.1, value_parser = parse_fraction)]
    validation_fraction: f64,

    /// Seed for weight initialization and shuffling; random if not given
    #[arg(long)]
    seed: Option<u64>,

    /// Save the trained network to FILE
    #[arg(long = "output", value_name = "FILE", default_value = "network.bin")]
    output_file: PathBuf,
}

#[derive(clap::Args)]
struct TestOptions {
    /// Network saved by `train`
    #[arg(long = "model", value_name = "FILE", default_value = "network.bin")]
    model_file: PathBuf,

    /// Directory holding the MNIST IDX files
    #[arg(long = "data", value_name = "DIR")]
    data_dir: PathBuf,
}

// Training needs at least some of the drawn images, so 1 is excluded here
// even though `Dataset::split` accepts it.
fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|err| format!("{err}"))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("{value} is not strictly between 0 and 1"))
    }
}

fn test_accuracy(network: &Network, data_dir: &Path) -> Result<f64> {
    let test = Dataset::load(data_dir, idx::TEST_IMAGES, idx::TEST_LABELS)?;
    let accuracy = network
        .run_samples(&test.to_samples())
        .context("error running test samples")?;
    Ok(accuracy)
}

fn train(options: TrainOptions) -> Result<()> {
    let config = TrainingConfig {
        epochs: options.epochs,
        eta: options.eta,
        lambda: options.lambda,
        mini_batch_size: options.mini_batch_size,
    };
    config.validate()?;

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let data = Dataset::load(&options.data_dir, idx::TRAINING_IMAGES, idx::TRAINING_LABELS)?;
    let size = options.training_size.min(data.len());
    let (training, validation) = data.split(options.validation_fraction, size, &mut rng)?;
    let training = training.to_samples();
    let validation = validation.to_samples();
    info!(
        training = training.len(),
        validation = validation.len(),
        "generated samples"
    );

    let inputs = data
        .images()
        .first()
        .map(|image| image.len())
        .context("training data is empty")?;
    let nodes: Vec<usize> = std::iter::once(inputs)
        .chain(options.hidden.iter().copied())
        .chain(std::iter::once(idx::NUM_CLASSES))
        .collect();
    let mut network = Network::new(&nodes, config.lambda)?;
    network.initialize_weights_and_biases(&mut rng);
    info!(
        ?nodes,
        weights = network.num_weights(),
        biases = network.num_biases(),
        cost = %options.cost,
        "created network"
    );

    let cost = options.cost.cost_function();
    let mut trainer = Trainer::new(config, rng);
    let pb = ProgressBar::new(config.epochs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] epoch {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    for _ in 0..config.epochs {
        let report = trainer.train_epoch(&mut network, cost, &training, &validation)?;
        pb.inc(1);
        pb.set_message(match report.validation_accuracy {
            Some(v) => format!("validation accuracy {v:.4}"),
            None => format!("training accuracy {:.4}", report.training_accuracy),
        });
    }
    pb.finish();

    let accuracy = test_accuracy(&network, &options.data_dir)?;
    println!("Accuracy: {accuracy:.6}");

    persist::save(&options.output_file, &network)?;
    Ok(())
}

fn test(options: TestOptions) -> Result<()> {
    let network = persist::load(&options.model_file)?;
    let accuracy = test_accuracy(&network, &options.data_dir)?;
    println!("Accuracy: {accuracy:.6}");
    Ok(())
}

fn main() {
    let options = Options::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match options.command {
        Command::Train(options) => train(options),
        Command::Test(options) => test(options),
    };
    if let Err(err) = result {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_fraction_range() {
        assert_eq!(parse_fraction("0.1"), Ok(0.1));
        for bad in ["0", "1", "1.0", "-0.5", "2", "NaN", "tenth"] {
            assert!(parse_fraction(bad).is_err(), "{bad} was accepted");
        }
    }

    #[test]
    fn train_rejects_whole_dataset_for_validation() {
        let parsed = Options::try_parse_from([
            "simple-neural-net",
            "train",
            "--data",
            "mnist",
            "--validation-fraction",
            "1",
        ]);
        assert!(parsed.is_err());

        let options = Options::try_parse_from(["simple-neural-net", "train", "--data", "mnist"])
            .unwrap();
        match options.command {
            Command::Train(train) => assert_eq!(train.validation_fraction, 0.1),
            Command::Test(_) => panic!("parsed as test"),
        }
    }
}
