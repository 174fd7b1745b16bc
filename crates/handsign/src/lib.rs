//! Hand sign capture, labeling, and classification.
//!
//! `handsign` reads frames from a webcam, runs a hand landmark network on them, and lets the user
//! label the resulting [`LandmarkVector`]s. The labeled [`Dataset`] can then be used to train a
//! small dense classifier, which predicts the label of the hand currently in view.
//!
//! # Environment Variables
//!
//! See [`config::Config::from_env`] for the full list. The most important ones are:
//!
//! * `HANDSIGN_WEBCAM_NAME`: Name of the [`Webcam`] to open. If unset, the first device that
//!   supports a compatible image format will be used.
//! * `HANDSIGN_LANDMARK_MODEL`: Path to the ONNX hand landmark network.
//!
//! [`LandmarkVector`]: landmark::LandmarkVector
//! [`Dataset`]: dataset::Dataset
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod session;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .filter(Some("eframe"), LevelFilter::Warn)
        .filter(Some("egui"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `handsign` will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `wgpu`, `eframe` and `egui` will always log at *warn* level. `RUST_LOG` is applied on top.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
