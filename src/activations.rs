//! Parameter-free stages of the network: the rectifier and the softmax head.
use ndarray::{Array2, Axis, Zip};
use std::fmt;

/// A stage that transforms a batch and remembers what its backward pass needs.
///
/// Like [`crate::layers::DenseLayer`], each implementor owns a single cache slot
/// that the next `forward` overwrites.
pub trait Activation: fmt::Debug {
    fn forward(&mut self, input: &Array2<f64>) -> Array2<f64>;

    /// # Panics
    /// If called before any `forward`.
    fn backward(&self, grad: &Array2<f64>) -> Array2<f64>;
}

/// ReLU: max(0, x)
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    mask: Option<Array2<bool>>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }

    /// `x > 0` for the last forward input.
    pub fn mask(&self) -> Option<&Array2<bool>> {
        self.mask.as_ref()
    }
}

impl Activation for ReLU {
    fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        self.mask = Some(input.mapv(|x| x > 0.0));
        input.mapv(|x| x.max(0.0))
    }

    // The mask is false at exactly zero, so the subgradient there is zero.
    fn backward(&self, grad: &Array2<f64>) -> Array2<f64> {
        let mask = self
            .mask
            .as_ref()
            .expect("ReLU::backward called without a preceding forward");
        Zip::from(grad)
            .and(mask)
            .map_collect(|&g, &keep| if keep { g } else { 0.0 })
    }
}

/// Row-wise softmax over logits, stabilized by subtracting each row's maximum.
#[derive(Debug, Clone, Default)]
pub struct SoftmaxHead {
    probabilities: Option<Array2<f64>>,
}

impl SoftmaxHead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probabilities(&self) -> Option<&Array2<f64>> {
        self.probabilities.as_ref()
    }
}

impl Activation for SoftmaxHead {
    fn forward(&mut self, logits: &Array2<f64>) -> Array2<f64> {
        let mut probs = logits.to_owned();
        for mut row in probs.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            row /= sum;
        }
        self.probabilities = Some(probs.clone());
        probs
    }

    /// Full Jacobian-vector product `y ⊙ (g - Σ(g ⊙ y))` per row.
    ///
    /// The training path never calls this: [`crate::loss::CrossEntropyLoss::backward`]
    /// already returns the gradient with respect to the logits.
    fn backward(&self, grad: &Array2<f64>) -> Array2<f64> {
        let y = self
            .probabilities
            .as_ref()
            .expect("SoftmaxHead::backward called without a preceding forward");
        let weighted = (grad * y).sum_axis(Axis(1)).insert_axis(Axis(1));
        y * &(grad - &weighted)
    }
}
