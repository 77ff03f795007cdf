//! Metrics for evaluating neural network performance.
use crate::error::{Error, Result};
use ndarray::ArrayView1;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::Path;

/// Index of the largest entry; the first one wins on ties.
pub fn argmax(row: ArrayView1<'_, f64>) -> usize {
    row.iter()
        .enumerate()
        .fold(0usize, |max_i, (i, &v)| if v > row[max_i] { i } else { max_i })
}

/// Running accuracy and confusion counts over a test pass.
///
/// Serializes with an extra `accuracy_percent` field.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub correct: usize,
    pub total: usize,
    /// `confusion[actual][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

impl EvalReport {
    pub fn new(num_classes: usize) -> Self {
        Self {
            correct: 0,
            total: 0,
            confusion: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn record(&mut self, predicted: usize, actual: usize) {
        self.total += 1;
        if predicted == actual {
            self.correct += 1;
        }
        if let Some(cell) = self
            .confusion
            .get_mut(actual)
            .and_then(|row| row.get_mut(predicted))
        {
            *cell += 1;
        }
    }

    pub fn accuracy_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }
}

impl Serialize for EvalReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EvalReport", 4)?;
        state.serialize_field("correct", &self.correct)?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("accuracy_percent", &self.accuracy_percent())?;
        state.serialize_field("confusion", &self.confusion)?;
        state.end()
    }
}

/// Text log of test-time predictions, buffered until the pass is done.
///
/// ```text
/// Current batch: 0
///  - image 0: Prediction=7. Label=7
/// ```
#[derive(Debug, Clone, Default)]
pub struct PredictionLog {
    buffer: String,
}

impl PredictionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_header(&mut self, batch: usize) {
        self.buffer.push_str(&format!("Current batch: {batch}\n"));
    }

    pub fn prediction(&mut self, image: usize, predicted: usize, actual: usize) {
        self.buffer.push_str(&format!(
            " - image {image}: Prediction={predicted}. Label={actual}\n"
        ));
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, &self.buffer).map_err(|e| Error::io(path, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossRecord {
    pub epoch: usize,
    pub batch: usize,
    pub loss: f64,
}

/// Per-batch training losses, exportable as `epoch,batch,loss` CSV.
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    records: Vec<LossRecord>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, epoch: usize, batch: usize, loss: f64) {
        self.records.push(LossRecord { epoch, batch, loss });
    }

    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let to_io = |e: csv::Error| Error::io(path, e.into());
        let mut wtr = csv::Writer::from_path(path).map_err(to_io)?;
        for record in &self.records {
            wtr.serialize(record).map_err(to_io)?;
        }
        wtr.flush().map_err(|e| Error::io(path, e))
    }
}
