//! Weight update rules.
use crate::error::{Error, Result};
use ndarray::Array2;

/// A rule that maps current weights and their gradient to updated weights.
///
/// Layers call this from inside their backward pass, so swapping the rule never
/// touches layer code.
pub trait Optimizer {
    fn update(&self, weights: &Array2<f64>, grad_weights: &Array2<f64>) -> Array2<f64>;
}

/// Plain stochastic gradient descent: `w - lr * dw`. Holds no per-parameter state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Result<Self> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning rate must be finite and > 0, got {learning_rate}"
            )));
        }
        Ok(Self { learning_rate })
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Optimizer for Sgd {
    fn update(&self, weights: &Array2<f64>, grad_weights: &Array2<f64>) -> Array2<f64> {
        debug_assert_eq!(weights.dim(), grad_weights.dim());
        weights - &(grad_weights * self.learning_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn step_moves_against_the_gradient() {
        let sgd = Sgd::new(0.5).unwrap();
        let w = array![[1.0, -2.0], [0.0, 4.0]];
        let g = array![[2.0, -2.0], [1.0, 0.0]];
        let updated = sgd.update(&w, &g);
        let expected = array![[0.0, -1.0], [-0.5, 4.0]];
        for (a, b) in updated.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b);
        }
    }

    #[test]
    fn repeated_updates_are_stateless() {
        let sgd = Sgd::new(0.1).unwrap();
        let w = array![[1.0]];
        let g = array![[1.0]];
        assert_eq!(sgd.update(&w, &g), sgd.update(&w, &g));
    }

    #[test]
    fn rejects_bad_learning_rates() {
        for lr in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(Sgd::new(lr), Err(Error::Config(_))), "{lr}");
        }
    }
}
