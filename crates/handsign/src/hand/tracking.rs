//! The continuous detection loop.
//!
//! A [`DetectionLoop`] owns a camera and a [`LandmarkExtractor`] and runs them on a worker thread:
//! read a frame, detect, publish, repeat. The loop is paced by the camera's frame rate.
//!
//! The loop is tied to a [`CancellationToken`]. Dropping the [`DetectionLoop`] cancels the token
//! and joins the thread; since the thread owns the camera, this also releases the camera.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use crate::{
    cancel::CancellationToken,
    image::Image,
    landmark::{HandPose, LandmarkVector},
    session::LandmarkSource,
    timer::{FpsCounter, Timer},
    video::FrameSource,
};

use super::landmark::LandmarkExtractor;

/// The result of one detection pass.
#[derive(Debug, Clone)]
pub struct DetectionFrame {
    /// The camera frame the detection ran on.
    pub image: Arc<Image>,
    /// The detected hand, if any.
    pub pose: Option<HandPose>,
    /// The flattened [`DetectionFrame::pose`]; empty if no hand was detected.
    pub landmarks: LandmarkVector,
}

/// Handle to a running detection worker.
pub struct DetectionLoop {
    cancel: CancellationToken,
    frames: Receiver<DetectionFrame>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionLoop {
    /// Time [`LandmarkSource::detect_once`] waits for a detection pass before giving up.
    pub const DETECT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Spawns the worker thread, which takes ownership of `source` and `extractor`.
    pub fn spawn<S, E>(source: S, extractor: E) -> io::Result<Self>
    where
        S: FrameSource + 'static,
        E: LandmarkExtractor + 'static,
    {
        let cancel = CancellationToken::new();
        // Single-slot channel: the worker replaces an unconsumed frame with the newer one.
        let (sender, frames) = crossbeam::channel::bounded(1);
        let worker = Worker {
            source: Box::new(source),
            extractor: Box::new(extractor),
            cancel: cancel.clone(),
            sender,
            stale: frames.clone(),
        };
        let handle = thread::Builder::new()
            .name("hand detection".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            cancel,
            frames,
            handle: Some(handle),
        })
    }

    /// Returns the most recent detection result that hasn't been retrieved yet, without blocking.
    pub fn latest(&mut self) -> Option<DetectionFrame> {
        self.frames.try_iter().last()
    }

    /// Waits up to `timeout` for the next detection result.
    ///
    /// Returns [`None`] on timeout or when the loop has stopped.
    pub fn next_blocking(&mut self, timeout: Duration) -> Option<DetectionFrame> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("no detection result within {:?}", timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns whether the worker has exited (because it was cancelled or the camera failed).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the loop and waits for the worker (and with it the camera) to shut down.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("hand detection worker panicked");
            }
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl LandmarkSource for DetectionLoop {
    fn detect_once(&mut self) -> LandmarkVector {
        self.next_blocking(Self::DETECT_TIMEOUT)
            .map(|frame| frame.landmarks)
            .unwrap_or_default()
    }
}

struct Worker {
    source: Box<dyn FrameSource>,
    extractor: Box<dyn LandmarkExtractor>,
    cancel: CancellationToken,
    sender: Sender<DetectionFrame>,
    stale: Receiver<DetectionFrame>,
}

impl Worker {
    fn run(mut self) {
        log::trace!("hand detection starting");
        let _guard = self.cancel.cancel_on_drop();
        let t_detect = Timer::new("detect");
        let mut fps = FpsCounter::new("hand detection");

        while !self.cancel.is_cancelled() {
            let image = match self.source.read_frame() {
                Ok(image) => image,
                Err(e) => {
                    log::error!("camera read failed, stopping detection: {e}");
                    break;
                }
            };

            let pose = t_detect.time(|| self.extractor.detect(&image));
            // No hand means an empty vector, never the previous frame's landmarks.
            let landmarks = pose.as_ref().map(HandPose::to_vector).unwrap_or_default();
            self.publish(DetectionFrame {
                image: Arc::new(image),
                pose,
                landmarks,
            });

            fps.tick_with(
                std::iter::once(&t_detect)
                    .chain(self.source.timers())
                    .chain(self.extractor.timers()),
            );
        }

        // `self.source` is dropped here, which releases the camera.
        log::trace!("hand detection exiting");
    }

    fn publish(&self, frame: DetectionFrame) {
        // Discard a result the consumer hasn't picked up yet, then send. The worker is the only
        // sender, so the slot is free afterwards unless the consumer is gone.
        let _ = self.stale.try_recv();
        if self.sender.try_send(frame).is_err() {
            log::trace!("detection result dropped");
        }
    }
}
