//! The fixed two-layer perceptron: Dense → ReLU → Dense → Softmax, trained with cross-entropy.
use crate::activations::{Activation, ReLU, SoftmaxHead};
use crate::datasets::NUM_CLASSES;
use crate::error::{Error, Result};
use crate::layers::DenseLayer;
use crate::loss::CrossEntropyLoss;
use crate::metrics::argmax;
use crate::optim::Sgd;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;

/// Pixels in a 28x28 image.
pub const INPUT_DIM: usize = 28 * 28;

/// MLP
#[derive(Debug, Clone)]
pub struct Network {
    fc1: DenseLayer,
    relu: ReLU,
    fc2: DenseLayer,
    softmax: SoftmaxHead,
    loss: CrossEntropyLoss,
    optimizer: Sgd,
}

impl Network {
    /// `784 -> hidden_size -> 10`, weights drawn from a generator seeded with `seed`.
    pub fn new(hidden_size: usize, learning_rate: f64, seed: u64) -> Result<Self> {
        Self::with_dims(INPUT_DIM, hidden_size, NUM_CLASSES, learning_rate, seed)
    }

    pub fn with_dims(
        input_dim: usize,
        hidden_size: usize,
        num_classes: usize,
        learning_rate: f64,
        seed: u64,
    ) -> Result<Self> {
        if input_dim == 0 || hidden_size == 0 || num_classes == 0 {
            return Err(Error::Config(format!(
                "layer sizes must be > 0, got {input_dim} -> {hidden_size} -> {num_classes}"
            )));
        }
        let optimizer = Sgd::new(learning_rate)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let fc1 = DenseLayer::new(input_dim, hidden_size, &mut rng);
        let fc2 = DenseLayer::new(hidden_size, num_classes, &mut rng);
        Ok(Self {
            fc1,
            relu: ReLU::new(),
            fc2,
            softmax: SoftmaxHead::new(),
            loss: CrossEntropyLoss::new(),
            optimizer,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.fc1.input_dim()
    }

    pub fn hidden_size(&self) -> usize {
        self.fc1.output_dim()
    }

    pub fn num_classes(&self) -> usize {
        self.fc2.output_dim()
    }

    pub fn optimizer(&self) -> &Sgd {
        &self.optimizer
    }

    /// The hidden and output layers, in that order.
    pub fn layers(&self) -> (&DenseLayer, &DenseLayer) {
        (&self.fc1, &self.fc2)
    }

    /// Class probabilities for a `batch x input_dim` matrix.
    pub fn forward(&mut self, batch: &Array2<f64>) -> Result<Array2<f64>> {
        if batch.ncols() != self.input_dim() {
            return Err(Error::Shape(format!(
                "batch has {} columns, network expects {}",
                batch.ncols(),
                self.input_dim()
            )));
        }
        let hidden = self.fc1.forward(batch);
        let hidden = self.relu.forward(&hidden);
        let logits = self.fc2.forward(&hidden);
        Ok(self.softmax.forward(&logits))
    }

    /// One gradient-descent step on a batch; returns the batch loss measured before the step.
    pub fn train_batch(&mut self, images: &Array2<f64>, labels: &Array2<f64>) -> Result<f64> {
        if labels.dim() != (images.nrows(), self.num_classes()) {
            return Err(Error::Shape(format!(
                "labels are {:?}, expected ({}, {})",
                labels.dim(),
                images.nrows(),
                self.num_classes()
            )));
        }
        let probs = self.forward(images)?;
        let loss = self.loss.forward(&probs, labels);
        let grad_logits = self.loss.backward(labels);
        self.backward(&grad_logits);
        Ok(loss)
    }

    // The combined softmax+CE gradient already targets the logits, so the
    // softmax head is skipped here.
    fn backward(&mut self, grad_logits: &Array2<f64>) {
        let grad_hidden = self.fc2.backward(grad_logits, &self.optimizer);
        let grad_hidden = self.relu.backward(&grad_hidden);
        self.fc1.backward(&grad_hidden, &self.optimizer);
    }

    /// Arg-max class per row.
    pub fn predict(&mut self, batch: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.forward(batch)?;
        Ok(probs.rows().into_iter().map(argmax).collect())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MLP: [{}, {}, {}] (lr = {})",
            self.input_dim(),
            self.hidden_size(),
            self.num_classes(),
            self.optimizer.learning_rate()
        )
    }
}
