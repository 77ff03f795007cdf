//! A from-scratch two-layer perceptron for MNIST-style digit classification.
//!
//! - IDX sample files (plain or gzip) decoded into normalized, row-major batches
//! - Dense layers with the bias fused into the weight matrix
//! - ReLU, softmax head and cross-entropy with the combined softmax+CE gradient
//! - Stateless SGD applied inside each dense layer's backward pass
//! - Seeded, wall-clock-bounded training loop and a test pass with a prediction log

pub mod activations;
pub mod config;
pub mod datasets;
pub mod dump;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optim;
pub mod training;
pub mod utils;

pub use activations::{Activation, ReLU, SoftmaxHead};
pub use config::{DataPaths, TrainConfig};
pub use datasets::{
    read_header, read_single_image, read_single_label, Batches, MnistDataset, SampleKind,
    NUM_CLASSES,
};
pub use error::{Error, Result};
pub use layers::DenseLayer;
pub use loss::CrossEntropyLoss;
pub use metrics::{EvalReport, LossHistory, PredictionLog};
pub use network::{Network, INPUT_DIM};
pub use optim::{Optimizer, Sgd};
pub use training::{TrainReport, TrainingLoop};
pub use utils::{summary_table, synthetic_dataset};
