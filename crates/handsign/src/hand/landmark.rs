//! Hand landmark prediction.

use std::path::Path;

use crate::{
    error::ExtractorError,
    image::{Image, Rect},
    landmark::HandPose,
    nn::{Cnn, NeuralNetwork, Tensor},
    timer::Timer,
};

/// Something that finds the keypoints of a hand in a camera frame.
pub trait LandmarkExtractor: Send {
    /// Runs detection on `frame`, returning the hand pose if a hand is visible.
    ///
    /// At most one hand is returned.
    fn detect(&mut self, frame: &Image) -> Option<HandPose>;

    /// Profiling timers to log alongside the detection frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Extractor used when no landmark network could be loaded. It never finds a hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExtractor;

impl LandmarkExtractor for NoExtractor {
    fn detect(&mut self, _frame: &Image) -> Option<HandPose> {
        None
    }
}

/// Runs a MediaPipe-style hand landmark network on the center of each frame.
///
/// The network is expected to take a `[1, 3, H, W]` RGB input with colors in `0.0..=1.0`, and to
/// output the screen landmarks as a `[1, 63]` tensor followed by a `[1, 1]` hand presence score.
pub struct HandLandmarker {
    cnn: Cnn,
    presence_threshold: f32,
    t_infer: Timer,
}

impl HandLandmarker {
    pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

    /// Loads the landmark network from an ONNX file.
    ///
    /// This has to succeed once before any detection can run.
    pub fn load(path: &Path) -> Result<Self, ExtractorError> {
        let load = || Cnn::new(NeuralNetwork::load(path)?, 0.0..=1.0);
        let cnn = load().map_err(|source| ExtractorError::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "loaded hand landmark network from {} ({} input)",
            path.display(),
            cnn.input_resolution(),
        );

        Ok(Self {
            cnn,
            presence_threshold: Self::DEFAULT_PRESENCE_THRESHOLD,
            t_infer: Timer::new("infer"),
        })
    }

    /// Sets the presence score below which a frame is considered to contain no hand.
    pub fn set_presence_threshold(&mut self, threshold: f32) {
        self.presence_threshold = threshold;
    }
}

impl LandmarkExtractor for HandLandmarker {
    fn detect(&mut self, frame: &Image) -> Option<HandPose> {
        let input_res = self.cnn.input_resolution();
        // Zoom into the center of the camera image so that the network input isn't stretched.
        let rect = frame.resolution().fit_aspect_ratio(input_res);
        let outputs = match self.t_infer.time(|| self.cnn.estimate(frame, rect)) {
            Ok(outputs) => outputs,
            Err(e) => {
                log::error!("hand landmark inference failed: {e}");
                return None;
            }
        };

        let pose = extract(&outputs, rect, input_res.width() as f32)?;
        if pose.presence() < self.presence_threshold {
            log::trace!("no hand (presence={:.2})", pose.presence());
            return None;
        }
        Some(pose)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_infer]
    }
}

/// Decodes the network outputs and maps the landmarks from network input coordinates into `rect`.
fn extract(outputs: &[Tensor], rect: Rect, input_width: f32) -> Option<HandPose> {
    let (Some(screen_landmarks), Some(presence)) = (outputs.first(), outputs.get(1)) else {
        log::error!("landmark network returned {} outputs, expected at least 2", outputs.len());
        return None;
    };
    let &[presence] = presence.as_slice() else {
        log::error!("unexpected presence output shape {:?}", presence.shape());
        return None;
    };
    if screen_landmarks.as_slice().len() != HandPose::NUM_LANDMARKS * 3 {
        log::error!(
            "unexpected landmark output shape {:?}",
            screen_landmarks.shape()
        );
        return None;
    }

    let scale = rect.width() as f32 / input_width;
    let mut positions = [[0.0; 3]; HandPose::NUM_LANDMARKS];
    for (out, xyz) in positions
        .iter_mut()
        .zip(screen_landmarks.as_slice().chunks_exact(3))
    {
        *out = [
            rect.x() as f32 + xyz[0] * scale,
            rect.y() as f32 + xyz[1] * scale,
            xyz[2] * scale,
        ];
    }

    Some(HandPose::new(positions, presence))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::landmark::LandmarkIdx;

    fn outputs(presence: f32) -> Vec<Tensor> {
        let landmarks = Tensor::from_shape_fn([1, 63], |[_, i]| (i / 3) as f32 * 10.0);
        let presence = Tensor::from_shape_fn([1, 1], |_| presence);
        vec![landmarks, presence]
    }

    #[test]
    fn maps_into_crop() {
        let rect = Rect::new(80, 0, 448, 448);
        let pose = extract(&outputs(0.9), rect, 224.0).unwrap();
        assert_abs_diff_eq!(pose.presence(), 0.9);
        assert_eq!(pose.position(LandmarkIdx::Wrist), [80.0, 0.0, 0.0]);
        assert_eq!(pose.position(LandmarkIdx::ThumbCmc), [100.0, 20.0, 20.0]);
        assert_eq!(pose.to_vector().len(), 63);
    }

    #[test]
    fn rejects_malformed_outputs() {
        let rect = Rect::new(0, 0, 224, 224);
        assert!(extract(&[], rect, 224.0).is_none());
        assert!(extract(&outputs(0.9)[..1], rect, 224.0).is_none());

        let short = vec![
            Tensor::from_shape_fn([1, 42], |_| 0.0),
            Tensor::from_shape_fn([1, 1], |_| 1.0),
        ];
        assert!(extract(&short, rect, 224.0).is_none());
    }

    #[test]
    fn no_extractor_finds_nothing() {
        assert!(NoExtractor.detect(&Image::new(4, 4)).is_none());
    }
}
