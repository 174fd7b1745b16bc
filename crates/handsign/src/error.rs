//! Error types.
//!
//! Every error here is handled where it occurs: it is logged, and the session or UI state is left
//! unchanged (or minimally updated). None of them are fatal to the application.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors from acquiring or reading the camera.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("permission to access the camera was denied: {source}")]
    PermissionDenied { source: io::Error },
    #[error("no usable camera device: {reason}")]
    DeviceUnavailable { reason: String },
    #[error("camera stream failed: {source}")]
    Stream { source: io::Error },
}

impl CameraError {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }
}

/// Errors from initializing the hand landmark network.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("failed to load landmark model from {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        source: anyhow::Error,
    },
}

/// Errors from capturing a labeled sample.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("incomplete landmarks: expected {expected} values, found {len}")]
    IncompleteLandmarks { len: usize, expected: usize },
}

/// Errors from training the sign classifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrainError {
    #[error("cannot train on an empty dataset")]
    EmptyDataset,
    #[error("training data has the wrong shape: expected {expected} features, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("a training run is already in progress")]
    AlreadyTraining,
    #[error("training was aborted before producing a model")]
    Aborted,
}
