//! Utility functions for neural network training and evaluation.
use crate::datasets::{one_hot, Batches, MnistDataset, SampleKind, NUM_CLASSES};
use crate::error::Result;
use crate::network::INPUT_DIM;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a learnable 784-wide, 10-class dataset.
///
/// Sample `i` has class `i % 10`; its pixels are low noise except every tenth
/// pixel starting at the class index, which is bright.
pub fn synthetic_dataset(samples: usize, batch_size: usize, seed: u64) -> Result<MnistDataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut images = Array2::zeros((samples, INPUT_DIM));
    let mut labels = Array2::zeros((samples, NUM_CLASSES));
    for (i, (mut image, mut label)) in images
        .rows_mut()
        .into_iter()
        .zip(labels.rows_mut())
        .enumerate()
    {
        let class = i % NUM_CLASSES;
        for (j, px) in image.iter_mut().enumerate() {
            let noise: f64 = rng.gen_range(0.0..0.2);
            *px = if j % NUM_CLASSES == class { 0.8 + noise } else { noise };
        }
        label.assign(&one_hot(class, NUM_CLASSES));
    }
    MnistDataset::from_batches(
        Batches::from_matrix(SampleKind::Images, &images, batch_size)?,
        Batches::from_matrix(SampleKind::Labels, &labels, batch_size)?,
    )
}

/// Render a small table summarizing a loss series.
pub fn summary_table(values: &[f64], title: &str) -> String {
    let mut out = format!("\n{title} Summary Table:\n");
    out.push_str("+----------------+------------+\n");
    out.push_str("| Statistic      |      Value |\n");
    out.push_str("+----------------+------------+\n");
    if let (Some(first), Some(last)) = (values.first(), values.last()) {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        for (name, value) in [("First", *first), ("Last", *last), ("Mean", mean), ("Min", min)] {
            out.push_str(&format!("| {name:<14} | {value:>10.6} |\n"));
        }
    }
    out.push_str("+----------------+------------+\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_data_is_well_formed() {
        let data = synthetic_dataset(23, 5, 9).unwrap();
        assert_eq!(data.len(), 23);
        assert_eq!(data.num_batches(), 5);
        for i in 0..23 {
            let (image, label) = data.sample(i).unwrap();
            assert_eq!(image.len(), INPUT_DIM);
            assert!(image.iter().all(|v| (0.0..=1.0).contains(v)));
            assert_eq!(label[i % NUM_CLASSES], 1.0);
            assert_eq!(label.sum(), 1.0);
        }
    }

    #[test]
    fn summary_table_reports_first_last_mean_min() {
        let table = summary_table(&[2.0, 1.0, 3.0], "Training Loss");
        assert!(table.contains("Training Loss Summary Table:"));
        assert!(table.contains("| First          |   2.000000 |"));
        assert!(table.contains("| Last           |   3.000000 |"));
        assert!(table.contains("| Mean           |   2.000000 |"));
        assert!(table.contains("| Min            |   1.000000 |"));
    }

    #[test]
    fn summary_table_of_nothing_is_just_the_frame() {
        let table = summary_table(&[], "Empty");
        assert!(!table.contains("Mean"));
    }
}
