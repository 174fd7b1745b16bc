//! Hand sign classification.
//!
//! The classifier is a small dense network ([`model::SignNet`]) trained with [`burn`] on the
//! captured [`Dataset`](crate::dataset::Dataset). Training runs on an autodiff-enabled CPU backend
//! ([`TrainBackend`]); the finished network is converted to the plain [`InferenceBackend`] and
//! wrapped in a [`SignClassifier`] together with the [`LabelTable`] it was trained with.

pub mod job;
pub mod model;
pub mod train;

use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    tensor::{activation::softmax, Tensor, TensorData},
};

use crate::{dataset::LabelTable, landmark::LandmarkVector};

use self::model::SignNet;

pub use self::train::{train, EpochStats, TrainConfig};

/// Backend used for inference.
pub type InferenceBackend = NdArray;

/// Backend used for training.
pub type TrainBackend = Autodiff<InferenceBackend>;

/// A trained sign classifier.
///
/// This is the session's model handle: it is produced by [`train`] and replaced as a whole by a
/// later successful training run.
#[derive(Debug, Clone)]
pub struct SignClassifier {
    net: SignNet<InferenceBackend>,
    labels: LabelTable,
    device: NdArrayDevice,
}

/// A decoded classifier output.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The predicted label.
    pub label: String,
    /// Index of the predicted class in the classifier's [`LabelTable`].
    pub index: usize,
    /// Softmax probability of the predicted class.
    pub confidence: f32,
}

impl SignClassifier {
    pub(crate) fn new(net: SignNet<InferenceBackend>, labels: LabelTable) -> Self {
        Self {
            net,
            labels,
            device: NdArrayDevice::default(),
        }
    }

    /// The labels this classifier can predict, in class index order.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Returns the class probabilities for `landmarks`, or [`None`] if the vector isn't complete.
    pub fn scores(&self, landmarks: &LandmarkVector) -> Option<Vec<f32>> {
        if !landmarks.is_complete() {
            return None;
        }

        let input = Tensor::<InferenceBackend, 2>::from_data(
            TensorData::new(landmarks.as_slice().to_vec(), [1, LandmarkVector::LEN]),
            &self.device,
        );
        let probabilities = softmax(self.net.forward(input), 1);
        match probabilities.into_data().to_vec::<f32>() {
            Ok(scores) => Some(scores),
            Err(e) => {
                log::error!("failed to read classifier output: {e:?}");
                None
            }
        }
    }

    /// Predicts the label of `landmarks`.
    ///
    /// Returns [`None`] if the vector isn't complete.
    pub fn predict(&self, landmarks: &LandmarkVector) -> Option<Prediction> {
        let scores = self.scores(landmarks)?;
        let (index, confidence) = argmax(&scores)?;
        let label = self.labels.label(index)?.to_string();
        Some(Prediction {
            label,
            index,
            confidence,
        })
    }
}

/// Returns the index and value of the largest score. Ties resolve to the lowest index.
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((i, score)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[0.5, 0.5]), Some((0, 0.5)));
    }
}
