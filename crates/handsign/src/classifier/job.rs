//! Background training.

use std::{
    io,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, TryRecvError};

use crate::{dataset::Dataset, error::TrainError};

use super::{train, EpochStats, SignClassifier, TrainConfig};

/// Progress report of a [`TrainingJob`].
#[derive(Debug)]
pub enum TrainEvent {
    /// An epoch has finished.
    Epoch(EpochStats),
    /// Training is over. This is always the last event of a job.
    Finished(Result<SignClassifier, TrainError>),
}

/// A training run on a background thread.
///
/// The job trains on a snapshot of the dataset, so capturing can continue while it runs.
pub struct TrainingJob {
    events: Receiver<TrainEvent>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl TrainingJob {
    pub fn spawn(dataset: Dataset, config: TrainConfig) -> io::Result<Self> {
        let (sender, events) = crossbeam::channel::unbounded();
        let handle = thread::Builder::new()
            .name("sign training".into())
            .spawn(move || {
                let result = train(&dataset, &config, |stats| {
                    sender.send(TrainEvent::Epoch(*stats)).ok();
                });
                sender.send(TrainEvent::Finished(result)).ok();
            })?;

        Ok(Self {
            events,
            handle: Some(handle),
            finished: false,
        })
    }

    /// Returns all events that arrived since the last call, without blocking.
    ///
    /// If the worker died without reporting a result, a final
    /// `TrainEvent::Finished(Err(TrainError::Aborted))` is synthesized.
    pub fn poll(&mut self) -> Vec<TrainEvent> {
        let mut events = Vec::new();
        while !self.finished {
            match self.events.try_recv() {
                Ok(event) => {
                    self.finished = matches!(event, TrainEvent::Finished(_));
                    events.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::error!("training worker exited without a result");
                    self.finished = true;
                    events.push(TrainEvent::Finished(Err(TrainError::Aborted)));
                }
            }
        }
        if self.finished {
            self.join();
        }
        events
    }

    /// Blocks until the job is done and returns its result, skipping progress events.
    pub fn wait(mut self) -> Result<SignClassifier, TrainError> {
        while !self.finished {
            match self.events.recv() {
                Ok(TrainEvent::Finished(result)) => {
                    self.finished = true;
                    self.join();
                    return result;
                }
                Ok(TrainEvent::Epoch(_)) => {}
                Err(_) => break,
            }
        }
        self.finished = true;
        self.join();
        Err(TrainError::Aborted)
    }

    /// Returns whether the job has delivered its final event.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("training worker panicked");
            }
        }
    }
}

impl Drop for TrainingJob {
    fn drop(&mut self) {
        // There is no way to interrupt burn mid-epoch; the thread finishes in the background.
        if !self.finished && self.handle.is_some() {
            log::debug!("abandoning unfinished training job");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{dataset::LabeledSample, landmark::LandmarkVector};

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new();
        for i in 0..4 {
            let label = if i % 2 == 0 { "A" } else { "B" };
            dataset.push(LabeledSample::new(
                LandmarkVector::from_raw(vec![i as f32; LandmarkVector::LEN]),
                label.into(),
            ));
        }
        dataset
    }

    fn config() -> TrainConfig {
        TrainConfig {
            epochs: 2,
            batch_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn streams_epochs_then_result() {
        let mut job = TrainingJob::spawn(dataset(), config()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(120);
        let mut events = Vec::new();
        while !job.is_finished() {
            assert!(Instant::now() < deadline, "training did not finish");
            events.extend(job.poll());
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], TrainEvent::Epoch(EpochStats { epoch: 1, .. })));
        assert!(matches!(events[1], TrainEvent::Epoch(EpochStats { epoch: 2, .. })));
        match &events[2] {
            TrainEvent::Finished(Ok(classifier)) => assert_eq!(classifier.labels().len(), 2),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(job.poll().is_empty());
    }

    #[test]
    fn reports_training_errors() {
        let job = TrainingJob::spawn(Dataset::new(), config()).unwrap();
        assert_eq!(job.wait().err(), Some(TrainError::EmptyDataset));
    }
}
