//! Epoch/batch orchestration for training and test-time evaluation.
use crate::config::TrainConfig;
use crate::datasets::MnistDataset;
use crate::error::{Error, Result};
use crate::metrics::{argmax, EvalReport, LossHistory, PredictionLog};
use crate::network::Network;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of [`TrainingLoop::train`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainReport {
    pub epochs_completed: usize,
    pub batches_seen: usize,
    /// Loss of every batch, in the order the batches were trained.
    pub batch_losses: Vec<f64>,
    /// Mean batch loss per epoch, including a final partial epoch on early stop.
    pub epoch_losses: Vec<f64>,
    pub elapsed_secs: f64,
    pub stopped_early: bool,
}

impl TrainReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.batch_losses.last().copied()
    }
}

/// Owns the network for a run and drives it over batched datasets.
#[derive(Debug, Clone)]
pub struct TrainingLoop {
    network: Network,
    config: TrainConfig,
}

impl TrainingLoop {
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let network = Network::new(config.hidden_size, config.learning_rate, config.seed)?;
        info!(%network, seed = config.seed, "network initialized");
        Ok(Self { network, config })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    fn check_batch_size(&self, data: &MnistDataset) -> Result<()> {
        if data.batch_size() != self.config.batch_size {
            return Err(Error::Shape(format!(
                "dataset is batched by {} but the run is configured for {}",
                data.batch_size(),
                self.config.batch_size
            )));
        }
        Ok(())
    }

    pub fn train(&mut self, data: &MnistDataset) -> Result<TrainReport> {
        self.train_with_history(data, &mut LossHistory::new())
    }

    /// Run every epoch over `data`, visiting batches in an order shuffled by a
    /// generator seeded with the epoch number. Stops the whole run as soon as a
    /// batch finishes past the configured time limit.
    pub fn train_with_history(
        &mut self,
        data: &MnistDataset,
        history: &mut LossHistory,
    ) -> Result<TrainReport> {
        if data.is_empty() {
            return Err(Error::Shape("training set has no samples".to_owned()));
        }
        self.check_batch_size(data)?;
        let start = Instant::now();
        let limit = self.config.time_limit();
        let epochs = self.config.epochs;
        let mut report = TrainReport::default();

        for epoch in 0..epochs {
            info!(epoch, epochs, batches = data.num_batches(), "starting epoch");
            let mut order: Vec<usize> = (0..data.num_batches()).collect();
            order.shuffle(&mut StdRng::seed_from_u64(epoch as u64));

            let mut epoch_loss = 0.0;
            let mut seen = 0usize;
            for &b in &order {
                let (images, labels) = data.batch(b)?;
                let loss = self.network.train_batch(images, labels)?;
                debug!(epoch, batch = b, loss, "batch trained");
                history.record(epoch, b, loss);
                report.batch_losses.push(loss);
                report.batches_seen += 1;
                epoch_loss += loss;
                seen += 1;

                let elapsed = start.elapsed();
                if elapsed >= limit {
                    warn!(
                        elapsed_secs = elapsed.as_secs_f64(),
                        limit_secs = limit.as_secs_f64(),
                        "time limit reached, stopping training early"
                    );
                    report.epoch_losses.push(epoch_loss / seen as f64);
                    report.elapsed_secs = elapsed.as_secs_f64();
                    report.stopped_early = true;
                    return Ok(report);
                }
            }

            let mean = epoch_loss / seen as f64;
            report.epoch_losses.push(mean);
            report.epochs_completed += 1;
            info!(epoch, mean_loss = mean, "epoch finished");
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(secs = report.elapsed_secs, "total training time");
        Ok(report)
    }

    /// Forward-only pass over `data`, collecting accuracy and the prediction log.
    pub fn evaluate(&mut self, data: &MnistDataset) -> Result<(EvalReport, PredictionLog)> {
        self.check_batch_size(data)?;
        let mut report = EvalReport::new(self.network.num_classes());
        let mut log = PredictionLog::new();

        for b in 0..data.num_batches() {
            log.batch_header(b);
            let (images, labels) = data.batch(b)?;
            let probs = self.network.forward(images)?;
            for (row, (p, l)) in probs.rows().into_iter().zip(labels.rows()).enumerate() {
                let predicted = argmax(p);
                let actual = argmax(l);
                log.prediction(b * data.batch_size() + row, predicted, actual);
                report.record(predicted, actual);
            }
        }
        Ok((report, log))
    }

    /// [`Self::evaluate`], then write the prediction log to `prediction_log`.
    pub fn test(&mut self, data: &MnistDataset, prediction_log: impl AsRef<Path>) -> Result<EvalReport> {
        let (report, log) = self.evaluate(data)?;
        log.write_to(prediction_log)?;
        info!(
            correct = report.correct,
            total = report.total,
            "test accuracy: {:.2}%",
            report.accuracy_percent()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::synthetic_dataset;

    fn small_config() -> TrainConfig {
        TrainConfig {
            learning_rate: 0.1,
            epochs: 3,
            batch_size: 8,
            hidden_size: 16,
            seed: 5,
            time_limit_secs: 3600,
        }
    }

    #[test]
    fn every_batch_of_every_epoch_is_trained() {
        let data = synthetic_dataset(30, 8, 1).unwrap();
        let mut run = TrainingLoop::new(small_config()).unwrap();
        let mut history = LossHistory::new();
        let report = run.train_with_history(&data, &mut history).unwrap();

        assert_eq!(report.epochs_completed, 3);
        assert_eq!(report.batches_seen, 3 * 4);
        assert_eq!(report.epoch_losses.len(), 3);
        assert!(!report.stopped_early);
        assert_eq!(history.records().len(), 12);

        for epoch in 0..3 {
            let mut visited: Vec<usize> = history
                .records()
                .iter()
                .filter(|r| r.epoch == epoch)
                .map(|r| r.batch)
                .collect();
            visited.sort_unstable();
            assert_eq!(visited, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn zero_time_limit_stops_after_the_first_batch() {
        let data = synthetic_dataset(30, 8, 1).unwrap();
        let config = TrainConfig {
            time_limit_secs: 0,
            ..small_config()
        };
        let mut run = TrainingLoop::new(config).unwrap();
        let report = run.train(&data).unwrap();

        assert!(report.stopped_early);
        assert_eq!(report.batches_seen, 1);
        assert_eq!(report.epochs_completed, 0);
        assert_eq!(report.epoch_losses.len(), 1);
    }

    #[test]
    fn same_seed_reproduces_the_same_losses() {
        let data = synthetic_dataset(40, 8, 2).unwrap();
        let a = TrainingLoop::new(small_config()).unwrap().train(&data).unwrap();
        let b = TrainingLoop::new(small_config()).unwrap().train(&data).unwrap();
        assert_eq!(a.batch_losses, b.batch_losses);
        assert_eq!(a.final_loss(), b.final_loss());
    }

    #[test]
    fn evaluation_logs_one_line_per_sample_plus_headers() {
        let data = synthetic_dataset(10, 4, 3).unwrap();
        let config = TrainConfig {
            batch_size: 4,
            ..small_config()
        };
        let mut run = TrainingLoop::new(config).unwrap();
        let (report, log) = run.evaluate(&data).unwrap();

        assert_eq!(report.total, 10);
        let lines: Vec<&str> = log.as_str().lines().collect();
        assert_eq!(lines.len(), 10 + 3);
        assert_eq!(lines[0], "Current batch: 0");
        assert_eq!(lines[5], "Current batch: 1");
        assert!(lines[6].starts_with(" - image 4: Prediction="));
        assert_eq!(lines[10], "Current batch: 2");
        assert!(lines[12].starts_with(" - image 9: "));
    }

    #[test]
    fn datasets_batched_differently_from_the_config_are_rejected() {
        let data = synthetic_dataset(20, 5, 3).unwrap();
        let mut run = TrainingLoop::new(small_config()).unwrap();
        assert!(matches!(run.train(&data), Err(Error::Shape(_))));
        assert!(matches!(run.evaluate(&data), Err(Error::Shape(_))));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let data = synthetic_dataset(0, 4, 3).unwrap();
        let mut run = TrainingLoop::new(small_config()).unwrap();
        assert!(matches!(run.train(&data), Err(Error::Shape(_))));
    }
}
