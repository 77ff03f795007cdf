//! Run configuration: hyperparameters and file locations.
use crate::datasets::MnistDataset;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub hidden_size: usize,
    /// Seeds weight initialization. Epoch shuffles are seeded by the epoch number.
    pub seed: u64,
    /// Wall-clock ceiling checked after every batch.
    pub time_limit_secs: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            epochs: 10,
            batch_size: 32,
            hidden_size: 128,
            seed: 1337,
            time_limit_secs: 20 * 60,
        }
    }
}

impl TrainConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be > 0".to_owned()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be > 0".to_owned()));
        }
        if self.hidden_size == 0 {
            return Err(Error::Config("hidden size must be > 0".to_owned()));
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

/// Train/test file locations plus where the prediction log goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub train_images: PathBuf,
    pub train_labels: PathBuf,
    pub test_images: PathBuf,
    pub test_labels: PathBuf,
    pub prediction_log: PathBuf,
}

impl DataPaths {
    pub fn load_train(&self, batch_size: usize) -> Result<MnistDataset> {
        MnistDataset::load(&self.train_images, &self.train_labels, batch_size)
    }

    pub fn load_test(&self, batch_size: usize) -> Result<MnistDataset> {
        MnistDataset::load(&self.test_images, &self.test_labels, batch_size)
    }
}
