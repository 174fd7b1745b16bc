use handsign::{
    classifier::TrainConfig,
    error::{CaptureError, TrainError},
    landmark::LandmarkVector,
    session::Session,
};

fn random_hand(rng: &mut fastrand::Rng, offset: f32) -> LandmarkVector {
    let values = (0..LandmarkVector::LEN)
        .map(|_| offset + rng.f32() * 0.1)
        .collect();
    LandmarkVector::from_raw(values)
}

fn quick_training() -> TrainConfig {
    TrainConfig {
        epochs: 5,
        batch_size: 4,
        ..Default::default()
    }
}

fn capture(session: &mut Session, landmarks: LandmarkVector, label: &str) -> usize {
    session.update_landmarks(landmarks);
    session
        .capture_sign(label, &mut LandmarkVector::empty)
        .unwrap()
}

#[test]
fn captures_in_order() {
    let mut rng = fastrand::Rng::with_seed(1);
    let mut session = Session::new();
    for i in 0..3 {
        assert_eq!(capture(&mut session, random_hand(&mut rng, 0.0), "A"), i + 1);
    }
    for i in 3..6 {
        assert_eq!(capture(&mut session, random_hand(&mut rng, 1.0), "B"), i + 1);
    }

    let labels = session.dataset().labels().collect::<Vec<_>>();
    assert_eq!(labels, ["A", "A", "A", "B", "B", "B"]);
    assert!(session
        .dataset()
        .iter()
        .all(|sample| sample.landmarks().len() == 63));
}

#[test]
fn incomplete_landmarks_are_not_captured() {
    let mut session = Session::new();
    session.update_landmarks(LandmarkVector::from_raw(vec![0.5; 42]));
    let err = session
        .capture_sign("A", &mut LandmarkVector::empty)
        .unwrap_err();
    assert_eq!(
        err,
        CaptureError::IncompleteLandmarks {
            len: 42,
            expected: 63
        }
    );
    assert_eq!(session.dataset_len(), 0);
}

#[test]
fn capture_without_camera() {
    // The camera could not be opened, so every detection pass comes back empty.
    let mut session = Session::new();
    assert!(session
        .capture_sign("A", &mut LandmarkVector::empty)
        .is_err());
    assert_eq!(session.dataset_len(), 0);
    assert_eq!(session.landmark_count(), 0);
    assert!(session.predict_sign().is_none());
}

#[test]
fn predict_before_training_is_noop() {
    let mut rng = fastrand::Rng::with_seed(2);
    let mut session = Session::new();
    capture(&mut session, random_hand(&mut rng, 0.0), "A");
    assert!(session.predict_sign().is_none());
    assert!(session.prediction().is_none());
}

#[test]
fn failed_training_keeps_previous_model() {
    let mut rng = fastrand::Rng::with_seed(3);
    let mut session = Session::new();
    assert_eq!(
        session.train_model(&quick_training(), |_| {}),
        Err(TrainError::EmptyDataset)
    );
    assert!(!session.is_trained());

    for _ in 0..4 {
        capture(&mut session, random_hand(&mut rng, 0.0), "A");
        capture(&mut session, random_hand(&mut rng, 1.0), "B");
    }
    session.train_model(&quick_training(), |_| {}).unwrap();
    assert!(session.is_trained());

    session.begin_training().unwrap();
    assert_eq!(
        session.train_model(&quick_training(), |_| {}),
        Err(TrainError::AlreadyTraining)
    );
    session.finish_training(Err(TrainError::Aborted));
    assert!(session.is_trained());
    assert!(!session.is_training());
}

#[test]
fn trains_and_predicts_two_signs() {
    let mut rng = fastrand::Rng::with_seed(4);
    let mut session = Session::new();
    for _ in 0..6 {
        capture(&mut session, random_hand(&mut rng, 0.0), "A");
        capture(&mut session, random_hand(&mut rng, 1.0), "B");
    }

    let mut epochs = Vec::new();
    session
        .train_model(&quick_training(), |stats| epochs.push(stats.epoch))
        .unwrap();
    assert_eq!(epochs, [1, 2, 3, 4, 5]);
    assert_eq!(session.last_epoch().map(|s| s.epoch), Some(5));

    let model = session.model().unwrap();
    assert_eq!(model.labels().len(), 2);
    assert_eq!(model.labels().iter().collect::<Vec<_>>(), ["A", "B"]);

    session.update_landmarks(random_hand(&mut rng, 1.0));
    let prediction = session.predict_sign().unwrap().clone();
    assert!(["A", "B"].contains(&prediction.label.as_str()));
    assert!((0.0..=1.0).contains(&prediction.confidence));
    assert_eq!(session.prediction(), Some(&prediction));

    // Losing the hand keeps the last prediction.
    session.update_landmarks(LandmarkVector::empty());
    assert!(session.predict_sign().is_none());
    assert_eq!(session.prediction(), Some(&prediction));
}

#[test]
fn reset_starts_over() {
    let mut rng = fastrand::Rng::with_seed(5);
    let mut session = Session::new();
    for _ in 0..2 {
        capture(&mut session, random_hand(&mut rng, 0.0), "A");
        capture(&mut session, random_hand(&mut rng, 1.0), "B");
    }
    session.train_model(&quick_training(), |_| {}).unwrap();

    session.reset();
    assert_eq!(session.dataset_len(), 0);
    assert!(!session.is_trained());
    assert_eq!(capture(&mut session, random_hand(&mut rng, 0.0), "C"), 1);
}
