//! Session state.
//!
//! A [`Session`] holds everything the user has done since the application started: the landmarks
//! of the most recent detection pass, the captured [`Dataset`], the trained [`SignClassifier`] (if
//! any), and the last [`Prediction`]. It is owned by the UI thread; detection and training results
//! produced on worker threads are applied to it from there.

use crate::{
    classifier::{train, EpochStats, Prediction, SignClassifier, TrainConfig},
    dataset::{Dataset, LabeledSample},
    error::{CaptureError, TrainError},
    landmark::LandmarkVector,
};

/// Something that can run a single hand detection pass on demand.
///
/// Used by [`Session::capture_sign`] when no detection result has arrived yet.
pub trait LandmarkSource {
    fn detect_once(&mut self) -> LandmarkVector;
}

impl<F: FnMut() -> LandmarkVector> LandmarkSource for F {
    fn detect_once(&mut self) -> LandmarkVector {
        self()
    }
}

#[derive(Default)]
pub struct Session {
    /// `None` until the first detection pass has produced a result.
    current: Option<LandmarkVector>,
    dataset: Dataset,
    model: Option<SignClassifier>,
    prediction: Option<Prediction>,
    training: bool,
    last_epoch: Option<EpochStats>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current landmarks with the result of a detection pass.
    ///
    /// An empty vector means no hand was found in that pass.
    pub fn update_landmarks(&mut self, landmarks: LandmarkVector) {
        self.current = Some(landmarks);
    }

    /// Labels the current landmarks and appends them to the dataset.
    ///
    /// If no detection pass has run yet, `source` is asked for one first. Returns the new dataset
    /// length, or an error (leaving the dataset untouched) if the landmarks aren't complete.
    pub fn capture_sign(
        &mut self,
        label: &str,
        source: &mut dyn LandmarkSource,
    ) -> Result<usize, CaptureError> {
        let current = self.current.get_or_insert_with(|| source.detect_once());
        if !current.is_complete() {
            let err = CaptureError::IncompleteLandmarks {
                len: current.len(),
                expected: LandmarkVector::LEN,
            };
            log::debug!("not capturing sign '{label}': {err}");
            return Err(err);
        }

        if label.is_empty() {
            log::warn!("capturing sign with an empty label");
        }
        let len = self
            .dataset
            .push(LabeledSample::new(current.clone(), label.to_string()));
        log::debug!("captured sign '{label}', {len} samples");
        Ok(len)
    }

    /// Marks a training run as started and returns the dataset snapshot to train on.
    ///
    /// Must be followed by [`Session::finish_training`].
    pub fn begin_training(&mut self) -> Result<Dataset, TrainError> {
        if self.training {
            return Err(TrainError::AlreadyTraining);
        }
        if self.dataset.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        self.training = true;
        self.last_epoch = None;
        Ok(self.dataset.clone())
    }

    pub fn record_epoch(&mut self, stats: EpochStats) {
        self.last_epoch = Some(stats);
    }

    /// Ends the current training run.
    ///
    /// A successful result replaces the model. On error, the previous model (if any) is kept.
    pub fn finish_training(&mut self, result: Result<SignClassifier, TrainError>) {
        self.training = false;
        match result {
            Ok(model) => {
                log::info!("model trained on {} labels", model.labels().len());
                self.model = Some(model);
            }
            Err(e) => log::error!("training failed: {e}"),
        }
    }

    /// Trains a model on the current dataset, blocking until training is done.
    pub fn train_model(
        &mut self,
        config: &TrainConfig,
        mut progress: impl FnMut(&EpochStats),
    ) -> Result<(), TrainError> {
        let dataset = self.begin_training()?;
        let mut last_epoch = None;
        let result = train(&dataset, config, |stats| {
            last_epoch = Some(*stats);
            progress(stats);
        });
        if let Some(stats) = last_epoch {
            self.record_epoch(stats);
        }

        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.finish_training(result);
        outcome
    }

    /// Predicts the label of the current landmarks.
    ///
    /// Does nothing and returns [`None`] if no model is trained or no complete hand is in view.
    /// The previous prediction is kept in that case.
    pub fn predict_sign(&mut self) -> Option<&Prediction> {
        let model = self.model.as_ref()?;
        let current = self.current.as_ref()?;
        let prediction = model.predict(current)?;
        log::debug!(
            "predicted '{}' ({:.1}%)",
            prediction.label,
            prediction.confidence * 100.0
        );
        self.prediction = Some(prediction);
        self.prediction.as_ref()
    }

    /// Discards all captured samples, the model, and the prediction.
    ///
    /// The detection state is kept. A training run in flight is not affected; its result will
    /// still be applied by [`Session::finish_training`].
    pub fn reset(&mut self) {
        log::info!("resetting session ({} samples)", self.dataset.len());
        self.dataset = Dataset::new();
        self.model = None;
        self.prediction = None;
        self.last_epoch = None;
    }

    /// Number of values in the current landmark vector (0 without a hand, 63 with one).
    pub fn landmark_count(&self) -> usize {
        self.current.as_ref().map_or(0, LandmarkVector::len)
    }

    pub fn current_landmarks(&self) -> Option<&LandmarkVector> {
        self.current.as_ref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    pub fn model(&self) -> Option<&SignClassifier> {
        self.model.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn last_epoch(&self) -> Option<&EpochStats> {
        self.last_epoch.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(value: f32) -> LandmarkVector {
        LandmarkVector::from_raw(vec![value; LandmarkVector::LEN])
    }

    fn no_source() -> impl FnMut() -> LandmarkVector {
        || -> LandmarkVector { panic!("detection should not be triggered") }
    }

    #[test]
    fn capture_runs_detection_once() {
        let mut session = Session::new();
        let mut calls = 0;
        let mut source = || {
            calls += 1;
            hand(0.5)
        };
        assert_eq!(session.capture_sign("A", &mut source), Ok(1));
        assert_eq!(session.capture_sign("A", &mut source), Ok(2));
        assert_eq!(calls, 1);
        assert_eq!(session.landmark_count(), 63);
    }

    #[test]
    fn capture_without_hand() {
        let mut session = Session::new();
        session.update_landmarks(LandmarkVector::empty());
        assert_eq!(
            session.capture_sign("A", &mut no_source()),
            Err(CaptureError::IncompleteLandmarks {
                len: 0,
                expected: 63
            })
        );
        assert_eq!(session.dataset_len(), 0);
    }

    #[test]
    fn empty_label_is_accepted() {
        let mut session = Session::new();
        session.update_landmarks(hand(0.1));
        assert_eq!(session.capture_sign("", &mut no_source()), Ok(1));
        assert_eq!(session.dataset().get(0).unwrap().label(), "");
    }

    #[test]
    fn training_is_single_flight() {
        let mut session = Session::new();
        assert_eq!(session.begin_training().err(), Some(TrainError::EmptyDataset));
        assert!(!session.is_training());

        session.update_landmarks(hand(0.1));
        session.capture_sign("A", &mut no_source()).unwrap();
        let snapshot = session.begin_training().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(session.is_training());
        assert_eq!(
            session.begin_training().err(),
            Some(TrainError::AlreadyTraining)
        );

        // Captures during training don't affect the snapshot.
        session.capture_sign("B", &mut no_source()).unwrap();
        assert_eq!(snapshot.len(), 1);

        session.finish_training(Err(TrainError::Aborted));
        assert!(!session.is_training());
        assert!(!session.is_trained());
    }

    #[test]
    fn predict_without_model_is_noop() {
        let mut session = Session::new();
        session.update_landmarks(hand(0.3));
        assert!(session.predict_sign().is_none());
        assert!(session.prediction().is_none());
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = Session::new();
        session.update_landmarks(hand(0.3));
        session.capture_sign("A", &mut no_source()).unwrap();
        session.reset();
        assert_eq!(session.dataset_len(), 0);
        assert!(!session.is_trained());
        assert!(session.prediction().is_none());
        assert_eq!(session.landmark_count(), 63);
    }
}
