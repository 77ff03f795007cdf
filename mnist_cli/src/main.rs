// mnist_cli/src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use mnist_cli::{init_tracing, parse_args};
use mnist_mlp::{summary_table, DataPaths, LossHistory, TrainConfig, TrainingLoop};
use serde_json::json;
use std::path::PathBuf;

/// Train a 784-hidden-10 perceptron on IDX files, then log test predictions.
#[derive(Parser, Debug)]
#[command(name = "mnist-train", version)]
struct Cli {
    learning_rate: f64,
    epochs: usize,
    batch_size: usize,
    hidden_size: usize,
    train_images: PathBuf,
    train_labels: PathBuf,
    test_images: PathBuf,
    test_labels: PathBuf,
    prediction_log: PathBuf,

    /// Weight-initialization seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Wall-clock training ceiling in seconds.
    #[arg(long)]
    time_limit_secs: Option<u64>,
    /// JSON file with base settings; positional values override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write per-batch losses here as CSV.
    #[arg(long)]
    loss_csv: Option<PathBuf>,
    /// Write the training and test reports here as JSON.
    #[arg(long)]
    report_json: Option<PathBuf>,
}

impl Cli {
    fn train_config(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };
        config.learning_rate = self.learning_rate;
        config.epochs = self.epochs;
        config.batch_size = self.batch_size;
        config.hidden_size = self.hidden_size;
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(secs) = self.time_limit_secs {
            config.time_limit_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    fn data_paths(&self) -> DataPaths {
        DataPaths {
            train_images: self.train_images.clone(),
            train_labels: self.train_labels.clone(),
            test_images: self.test_images.clone(),
            test_labels: self.test_labels.clone(),
            prediction_log: self.prediction_log.clone(),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli: Cli = parse_args();
    let config = cli.train_config()?;
    let paths = cli.data_paths();

    println!("Starting training with:");
    println!(" Learning rate: {}", config.learning_rate);
    println!(" Epochs: {}", config.epochs);
    println!(" Batch size: {}", config.batch_size);
    println!(" Hidden size: {}", config.hidden_size);

    let train_data = paths
        .load_train(config.batch_size)
        .context("loading training data")?;
    let mut run = TrainingLoop::new(config)?;
    let mut history = LossHistory::new();
    let train_report = run
        .train_with_history(&train_data, &mut history)
        .context("training")?;
    print!("{}", summary_table(&train_report.epoch_losses, "Training Loss"));
    if let Some(path) = &cli.loss_csv {
        history.write_csv(path)?;
    }

    println!("Training complete. Running test phase...");
    let test_data = paths
        .load_test(run.config().batch_size)
        .context("loading test data")?;
    let eval_report = run
        .test(&test_data, &paths.prediction_log)
        .context("testing")?;
    println!("Test accuracy: {:.2}%", eval_report.accuracy_percent());
    println!(
        "Test completed. Predictions logged to: {}",
        paths.prediction_log.display()
    );

    if let Some(path) = &cli.report_json {
        let report = json!({
            "config": run.config(),
            "train": train_report,
            "test": eval_report,
        });
        std::fs::write(path, serde_json::to_vec_pretty(&report)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
