//! Classifier training.

use burn::{
    backend::ndarray::NdArrayDevice,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::Backend, ElementConversion, Int, Tensor, TensorData},
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    classifier::{
        model::{SignNet, SignNetConfig},
        InferenceBackend, SignClassifier, TrainBackend,
    },
    dataset::{Dataset, LabelTable},
    error::TrainError,
    landmark::LandmarkVector,
};

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Learning rate of the Adam optimizer.
    pub learning_rate: f64,
    /// Fraction of the samples held out to compute validation metrics.
    pub validation_split: f64,
    pub dropout: f64,
    /// Seed for weight initialization, dropout, and the train/validation shuffle.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 16,
            learning_rate: 1e-4,
            validation_split: 0.2,
            dropout: 0.8,
            seed: 42,
        }
    }
}

/// Loss and accuracy after one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub epochs: usize,
    /// Mean categorical cross-entropy over the training batches.
    pub loss: f32,
    /// Fraction of training samples classified correctly during the epoch.
    pub accuracy: f32,
    /// Validation metrics, if any samples were held out.
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

/// Feature matrix and class indices derived from a [`Dataset`].
struct TrainingSet {
    /// Row-major `[rows, LandmarkVector::LEN]` features.
    features: Vec<f32>,
    targets: Vec<i64>,
    labels: LabelTable,
}

impl TrainingSet {
    fn new(dataset: &Dataset) -> Result<Self, TrainError> {
        if dataset.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        let labels = dataset.label_table();
        let mut features = Vec::with_capacity(dataset.len() * LandmarkVector::LEN);
        let mut targets = Vec::with_capacity(dataset.len());
        for sample in dataset.iter() {
            let row = sample.landmarks();
            if !row.is_complete() {
                return Err(TrainError::ShapeMismatch {
                    expected: LandmarkVector::LEN,
                    found: row.len(),
                });
            }
            features.extend_from_slice(row.as_slice());
            // Every label is in the table, it was built from the same dataset.
            let index = labels.index_of(sample.label()).unwrap_or_default();
            targets.push(index as i64);
        }

        Ok(Self {
            features,
            targets,
            labels,
        })
    }

    fn len(&self) -> usize {
        self.targets.len()
    }

    fn batch<B: Backend>(
        &self,
        rows: &[usize],
        device: &B::Device,
    ) -> (Tensor<B, 2>, Tensor<B, 1, Int>) {
        let mut features = Vec::with_capacity(rows.len() * LandmarkVector::LEN);
        let mut targets = Vec::with_capacity(rows.len());
        for &row in rows {
            let start = row * LandmarkVector::LEN;
            features.extend_from_slice(&self.features[start..start + LandmarkVector::LEN]);
            targets.push(self.targets[row]);
        }

        let x = Tensor::from_data(
            TensorData::new(features, [rows.len(), LandmarkVector::LEN]),
            device,
        );
        let y = Tensor::from_data(TensorData::new(targets, [rows.len()]), device);
        (x, y)
    }
}

/// Splits shuffled row indices into training and validation rows.
///
/// If holding out samples would leave nothing to train on, every row is used for training.
fn split_rows(len: usize, config: &TrainConfig, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut rows = (0..len).collect::<Vec<_>>();
    rows.shuffle(rng);

    let split = config.validation_split.clamp(0.0, 1.0);
    // The epsilon keeps `10 * 0.8` from flooring to 7.
    let num_train = (len as f64 * (1.0 - split) + 1e-9).floor() as usize;
    if num_train == 0 {
        return (rows, Vec::new());
    }
    let valid = rows.split_off(num_train);
    (rows, valid)
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

/// Trains a new [`SignClassifier`] on `dataset`.
///
/// The output layer has one unit per distinct label. `progress` is called after every epoch.
///
/// On error, no model is produced; callers keep whatever model they had.
pub fn train(
    dataset: &Dataset,
    config: &TrainConfig,
    mut progress: impl FnMut(&EpochStats),
) -> Result<SignClassifier, TrainError> {
    let set = TrainingSet::new(dataset)?;
    let device = NdArrayDevice::default();
    <TrainBackend as Backend>::seed(config.seed);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let (mut train_rows, valid_rows) = split_rows(set.len(), config, &mut rng);
    let batch_size = config.batch_size.max(1);
    log::info!(
        "training on {} samples ({} held out for validation), {} labels",
        train_rows.len(),
        valid_rows.len(),
        set.labels.len(),
    );

    let mut model = SignNetConfig::new(set.labels.len())
        .with_dropout(config.dropout)
        .init::<TrainBackend>(&device);
    let mut optim = AdamConfig::new().init::<TrainBackend, SignNet<TrainBackend>>();
    let loss_fn = CrossEntropyLossConfig::new().init::<TrainBackend>(&device);
    let valid_loss_fn = CrossEntropyLossConfig::new().init::<InferenceBackend>(&device);

    for epoch in 1..=config.epochs {
        train_rows.shuffle(&mut rng);

        let mut loss_sum = 0.0;
        let mut correct = 0;
        for rows in train_rows.chunks(batch_size) {
            let (x, y) = set.batch::<TrainBackend>(rows, &device);
            let logits = model.forward(x);
            let loss = loss_fn.forward(logits.clone(), y.clone());

            loss_sum += loss.clone().into_scalar().elem::<f32>() * rows.len() as f32;
            correct += count_correct(logits, y);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        let (val_loss, val_accuracy) = if valid_rows.is_empty() {
            (None, None)
        } else {
            let valid_model = model.valid();
            let (x, y) = set.batch::<InferenceBackend>(&valid_rows, &device);
            let logits = valid_model.forward(x);
            let loss = valid_loss_fn.forward(logits.clone(), y.clone());
            let correct = count_correct(logits, y);
            (
                Some(loss.into_scalar().elem::<f32>()),
                Some(correct as f32 / valid_rows.len() as f32),
            )
        };

        let stats = EpochStats {
            epoch,
            epochs: config.epochs,
            loss: loss_sum / train_rows.len() as f32,
            accuracy: correct as f32 / train_rows.len() as f32,
            val_loss,
            val_accuracy,
        };
        match (stats.val_loss, stats.val_accuracy) {
            (Some(val_loss), Some(val_acc)) => log::info!(
                "epoch {}/{}: loss={:.4} acc={:.3} val_loss={:.4} val_acc={:.3}",
                epoch,
                config.epochs,
                stats.loss,
                stats.accuracy,
                val_loss,
                val_acc,
            ),
            _ => log::info!(
                "epoch {}/{}: loss={:.4} acc={:.3}",
                epoch,
                config.epochs,
                stats.loss,
                stats.accuracy,
            ),
        }
        progress(&stats);
    }

    Ok(SignClassifier::new(model.valid(), set.labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LabeledSample;

    fn dataset(labels: &[&str]) -> Dataset {
        let mut dataset = Dataset::new();
        for (i, label) in labels.iter().enumerate() {
            let values = vec![i as f32 / 10.0; LandmarkVector::LEN];
            dataset.push(LabeledSample::new(
                LandmarkVector::from_raw(values),
                label.to_string(),
            ));
        }
        dataset
    }

    #[test]
    fn targets_use_distinct_labels() {
        let set = TrainingSet::new(&dataset(&["A", "B", "A", "C", "B", "A"])).unwrap();
        assert_eq!(set.labels.len(), 3);
        assert_eq!(set.targets, [0, 1, 0, 2, 1, 0]);
        assert_eq!(set.features.len(), 6 * LandmarkVector::LEN);
    }

    #[test]
    fn empty_dataset() {
        assert_eq!(
            TrainingSet::new(&Dataset::new()).err(),
            Some(TrainError::EmptyDataset)
        );
    }

    #[test]
    fn malformed_row() {
        let mut dataset = dataset(&["A"]);
        dataset.push(LabeledSample::new(
            LandmarkVector::from_raw(vec![0.0; 10]),
            "B".into(),
        ));
        assert_eq!(
            TrainingSet::new(&dataset).err(),
            Some(TrainError::ShapeMismatch {
                expected: 63,
                found: 10
            })
        );
    }

    #[test]
    fn split_holds_out_a_fifth() {
        let config = TrainConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (train, valid) = split_rows(10, &config, &mut rng);
        assert_eq!((train.len(), valid.len()), (8, 2));

        let mut all = train.iter().chain(&valid).copied().collect::<Vec<_>>();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn split_keeps_tiny_datasets_for_training() {
        let config = TrainConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (train, valid) = split_rows(1, &config, &mut rng);
        assert_eq!((train.len(), valid.len()), (1, 0));
    }

    #[test]
    fn reports_every_epoch() {
        let config = TrainConfig {
            epochs: 3,
            batch_size: 4,
            ..Default::default()
        };
        let mut seen = Vec::new();
        let classifier = train(&dataset(&["A", "B", "A", "B", "A", "B"]), &config, |stats| {
            seen.push(*stats)
        })
        .unwrap();

        assert_eq!(seen.iter().map(|s| s.epoch).collect::<Vec<_>>(), [1, 2, 3]);
        assert!(seen.iter().all(|s| s.loss.is_finite()));
        assert!(seen.iter().all(|s| (0.0..=1.0).contains(&s.accuracy)));
        // 6 samples: 4 train, 2 validation.
        assert!(seen.iter().all(|s| s.val_accuracy.is_some()));
        assert_eq!(classifier.labels().len(), 2);
    }
}
