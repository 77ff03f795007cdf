//! Fully connected layer with the bias fused into the weight matrix.
use crate::optim::Optimizer;
use ndarray::{s, Array2};
use rand::Rng;

/// A dense layer `y = [x | 1] · W`.
///
/// `W` has shape `(input_dim + 1, output_dim)`; its last row is the bias. The
/// layer keeps the augmented input of the most recent `forward` for the next
/// `backward`. That slot is not reentrant: one layer instance serves one
/// forward/backward pair at a time.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    input_dim: usize,
    output_dim: usize,
    weights: Array2<f64>,
    augmented_input: Option<Array2<f64>>,
}

impl DenseLayer {
    /// He (Kaiming) uniform initialization: `U(-sqrt(6/fan_in), sqrt(6/fan_in))`, zero bias.
    ///
    /// # Panics
    /// If either dimension is zero.
    pub fn new<R: Rng + ?Sized>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        assert!(
            input_dim > 0 && output_dim > 0,
            "dense layer dimensions must be non-zero ({input_dim} -> {output_dim})"
        );
        let limit = (6.0f64 / input_dim as f64).sqrt();
        let mut weights = Array2::<f64>::zeros((input_dim + 1, output_dim));
        weights
            .slice_mut(s![..input_dim, ..])
            .mapv_inplace(|_| rng.gen_range(-limit..limit));
        Self {
            input_dim,
            output_dim,
            weights,
            augmented_input: None,
        }
    }

    /// Build a layer from an explicit `(input_dim + 1) x output_dim` matrix.
    ///
    /// # Panics
    /// If the matrix has fewer than two rows or no columns.
    pub fn from_weights(weights: Array2<f64>) -> Self {
        assert!(
            weights.nrows() >= 2 && weights.ncols() >= 1,
            "weight matrix {:?} has no room for inputs plus a bias row",
            weights.dim()
        );
        Self {
            input_dim: weights.nrows() - 1,
            output_dim: weights.ncols(),
            weights,
            augmented_input: None,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Whether a forward pass has left an input for the next backward pass.
    pub fn has_cached_input(&self) -> bool {
        self.augmented_input.is_some()
    }

    /// `input` is `batch x input_dim`; returns `batch x output_dim`.
    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        assert_eq!(
            input.ncols(),
            self.input_dim,
            "dense layer expects {} input columns",
            self.input_dim
        );
        let mut augmented = Array2::<f64>::ones((input.nrows(), self.input_dim + 1));
        augmented.slice_mut(s![.., ..self.input_dim]).assign(input);
        let output = augmented.dot(&self.weights);
        self.augmented_input = Some(augmented);
        output
    }

    /// Consume the cached input, return `dL/dx` and apply `optimizer` to the weights.
    ///
    /// The returned gradient is computed from the weights as they were during
    /// `forward`; the update is applied afterwards.
    ///
    /// # Panics
    /// If called without a preceding `forward`.
    pub fn backward<O: Optimizer + ?Sized>(
        &mut self,
        grad_out: &Array2<f64>,
        optimizer: &O,
    ) -> Array2<f64> {
        let augmented = self
            .augmented_input
            .take()
            .expect("DenseLayer::backward called without a preceding forward");
        assert_eq!(grad_out.dim(), (augmented.nrows(), self.output_dim));

        let grad_weights = augmented.t().dot(grad_out);
        let grad_in = grad_out.dot(&self.weights.slice(s![..self.input_dim, ..]).t());
        self.weights = optimizer.update(&self.weights, &grad_weights);
        debug_assert_eq!(self.weights.dim(), (self.input_dim + 1, self.output_dim));
        grad_in
    }
}
