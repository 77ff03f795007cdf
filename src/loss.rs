//! Cross-entropy over softmax probabilities and its combined gradient.
use ndarray::Array2;

/// Added inside the logarithm so a zero probability never yields `-inf`.
pub const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    probabilities: Option<Array2<f64>>,
}

impl CrossEntropyLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean loss `-(1/batch) Σ label · ln(prob + ε)`; caches `probs` for [`Self::backward`].
    pub fn forward(&mut self, probs: &Array2<f64>, labels: &Array2<f64>) -> f64 {
        assert_eq!(probs.dim(), labels.dim(), "probabilities and labels differ in shape");
        let batch = probs.nrows() as f64;
        let loss = -(labels * &probs.mapv(|p| (p + EPSILON).ln())).sum() / batch;
        self.probabilities = Some(probs.clone());
        loss
    }

    /// `(probs - labels) / batch`: the gradient of softmax followed by cross-entropy
    /// with respect to the logits. Feed it straight into the output layer.
    ///
    /// # Panics
    /// If called before any `forward`.
    pub fn backward(&self, labels: &Array2<f64>) -> Array2<f64> {
        let probs = self
            .probabilities
            .as_ref()
            .expect("CrossEntropyLoss::backward called without a preceding forward");
        (probs - labels) / probs.nrows() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::{Activation, SoftmaxHead};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn two_sample_batch_matches_hand_computation() {
        let mut head = SoftmaxHead::new();
        let mut ce = CrossEntropyLoss::new();
        let labels = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let probs = head.forward(&array![[2.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);

        let loss = ce.forward(&probs, &labels);
        let expected = -(probs[[0, 0]].ln() + (1.0f64 / 3.0).ln()) / 2.0;
        assert_abs_diff_eq!(loss, expected, epsilon = 1e-9);
        assert_abs_diff_eq!(loss, 0.754, epsilon = 2e-3);
    }

    #[test]
    fn gradient_is_probs_minus_labels_over_batch() {
        let mut head = SoftmaxHead::new();
        let mut ce = CrossEntropyLoss::new();
        let labels = array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let probs = head.forward(&array![[0.1, 0.2, 0.3], [-4.0, 2.0, 1.0], [9.0, 9.0, 9.0]]);
        ce.forward(&probs, &labels);

        let grad = ce.backward(&labels);
        assert_eq!(grad, (&probs - &labels) / 3.0);
        // each row of a softmax+CE gradient sums to zero
        for row in grad.rows() {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_probability_stays_finite() {
        let mut ce = CrossEntropyLoss::new();
        let loss = ce.forward(&array![[0.0, 1.0]], &array![[1.0, 0.0]]);
        assert!(loss.is_finite());
        assert_abs_diff_eq!(loss, -(EPSILON.ln()), epsilon = 1e-9);
    }
}
