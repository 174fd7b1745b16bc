//! Video input.

pub mod webcam;

use crate::{error::CameraError, image::Image, timer::Timer};

/// A source of camera frames, such as a [`webcam::Webcam`].
///
/// Dropping the source must release the underlying device.
pub trait FrameSource: Send {
    /// Reads the next frame, blocking until one is available.
    fn read_frame(&mut self) -> Result<Image, CameraError>;

    /// Profiling timers to log alongside the detection frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}
