use mnist_mlp::{
    read_single_image, read_single_label, DataPaths, Error, MnistDataset, TrainConfig, TrainingLoop,
    INPUT_DIM, NUM_CLASSES,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sample `i` is digit `i % 10`: a bright vertical bar in a digit-specific column band.
fn write_fixture(dir: &Path, count: usize) -> (PathBuf, PathBuf) {
    let mut images = Vec::new();
    for field in [2051u32, count as u32, 28, 28] {
        images.extend_from_slice(&field.to_be_bytes());
    }
    let mut labels = Vec::new();
    for field in [2049u32, count as u32] {
        labels.extend_from_slice(&field.to_be_bytes());
    }
    for i in 0..count {
        let digit = i % NUM_CLASSES;
        for r in 0..28 {
            for c in 0..28 {
                let lit = c / 2 == digit + 2 && (4..24).contains(&r);
                images.push(if lit { 255 } else { ((i + r + c) % 16) as u8 });
            }
        }
        labels.push(digit as u8);
    }
    let image_path = dir.join("images-idx3-ubyte");
    let label_path = dir.join("labels-idx1-ubyte");
    fs::write(&image_path, images).unwrap();
    fs::write(&label_path, labels).unwrap();
    (image_path, label_path)
}

fn config() -> TrainConfig {
    TrainConfig {
        learning_rate: 0.1,
        epochs: 15,
        batch_size: 16,
        hidden_size: 32,
        seed: 1337,
        time_limit_secs: 3600,
    }
}

#[test]
fn train_then_test_writes_the_prediction_log() {
    let dir = TempDir::new().unwrap();
    let (images, labels) = write_fixture(dir.path(), 100);
    let data = MnistDataset::load(&images, &labels, 16).unwrap();
    assert_eq!(data.num_batches(), 7);
    assert_eq!(data.image_shape(), (28, 28));

    let mut run = TrainingLoop::new(config()).unwrap();
    let report = run.train(&data).unwrap();
    assert_eq!(report.epochs_completed, 15);
    assert_eq!(report.batches_seen, 15 * 7);
    let first = report.epoch_losses[0];
    let last = *report.epoch_losses.last().unwrap();
    assert!(last < first, "mean loss went from {first} to {last}");

    let log_path = dir.path().join("predictions.txt");
    let eval = run.test(&data, &log_path).unwrap();
    assert_eq!(eval.total, 100);
    assert!(eval.accuracy_percent() > 50.0, "{}", eval.accuracy_percent());

    let log = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 100 + 7);
    assert_eq!(lines[0], "Current batch: 0");
    assert_eq!(lines[17], "Current batch: 1");
    assert!(lines[18].starts_with(" - image 16: Prediction="));
    assert!(lines[18].ends_with(". Label=6"));
    assert_eq!(lines[102], "Current batch: 6");
    assert!(lines[106].starts_with(" - image 99: "));
}

#[test]
fn identical_seeds_reproduce_identical_runs() {
    let dir = TempDir::new().unwrap();
    let (images, labels) = write_fixture(dir.path(), 40);
    let data = MnistDataset::load(&images, &labels, 8).unwrap();
    let short = TrainConfig {
        epochs: 3,
        batch_size: 8,
        ..config()
    };

    let a = TrainingLoop::new(short.clone()).unwrap().train(&data).unwrap();
    let b = TrainingLoop::new(short).unwrap().train(&data).unwrap();
    assert_eq!(a.batch_losses, b.batch_losses);
    assert_eq!(a.epoch_losses, b.epoch_losses);
}

#[test]
fn random_access_reads_agree_with_the_batches() {
    let dir = TempDir::new().unwrap();
    let (images, labels) = write_fixture(dir.path(), 25);
    let data = MnistDataset::load(&images, &labels, 10).unwrap();

    for index in [0, 9, 10, 24] {
        let image = read_single_image(&images, index).unwrap();
        let label = read_single_label(&labels, index).unwrap();
        let (row, one_hot) = data.sample(index).unwrap();
        assert_eq!(image.len(), INPUT_DIM);
        assert_eq!(image.iter().copied().collect::<Vec<_>>(), row.to_vec());
        assert_eq!(label.to_vec(), one_hot.to_vec());
    }
    assert!(matches!(
        read_single_image(&images, 25),
        Err(Error::Range { .. })
    ));
}

#[test]
fn swapped_files_fail_with_a_format_error() {
    let dir = TempDir::new().unwrap();
    let (images, labels) = write_fixture(dir.path(), 5);
    let err = MnistDataset::load(&labels, &images, 2).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[test]
fn data_paths_load_both_splits_with_the_run_batch_size() {
    let dir = TempDir::new().unwrap();
    let (images, labels) = write_fixture(dir.path(), 20);
    let paths = DataPaths {
        train_images: images.clone(),
        train_labels: labels.clone(),
        test_images: images,
        test_labels: labels,
        prediction_log: dir.path().join("predictions.txt"),
    };
    let config = TrainConfig {
        epochs: 1,
        batch_size: 8,
        ..config()
    };

    let train = paths.load_train(config.batch_size).unwrap();
    let test = paths.load_test(config.batch_size).unwrap();
    let mut run = TrainingLoop::new(config).unwrap();
    run.train(&train).unwrap();
    let eval = run.test(&test, &paths.prediction_log).unwrap();
    assert_eq!(eval.total, 20);
    assert!(paths.prediction_log.exists());
}
