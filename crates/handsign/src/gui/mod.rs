//! The application window.
//!
//! [`run`] acquires the camera and the landmark network, starts the [`DetectionLoop`], and then
//! hands control to `eframe` until the window is closed. Failing to acquire either device does not
//! stop the application: the problem is logged, shown in the window, and the rest of the UI keeps
//! working.

mod app;

use crate::{
    config::Config,
    hand::{
        landmark::{HandLandmarker, NoExtractor},
        tracking::DetectionLoop,
    },
    video::webcam::{Webcam, WebcamOptions},
};

pub use self::app::SignApp;

/// A device problem shown in the status area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    NoVideo,
    NoLandmarkModel,
}

impl Problem {
    pub fn message(self) -> &'static str {
        match self {
            Problem::NoVideo => "no video",
            Problem::NoLandmarkModel => "no landmark model",
        }
    }
}

/// Opens the camera and the landmark network and starts detection.
///
/// Returns the running loop (if a camera could be opened) and the problems encountered.
pub fn start_detection(config: &Config) -> (Option<DetectionLoop>, Vec<Problem>) {
    let mut problems = Vec::new();

    let landmarker = match HandLandmarker::load(&config.landmark_model) {
        Ok(mut landmarker) => {
            landmarker.set_presence_threshold(config.presence_threshold);
            Some(landmarker)
        }
        Err(e) => {
            log::error!("{e}");
            problems.push(Problem::NoLandmarkModel);
            None
        }
    };

    let mut options = WebcamOptions::default().fps(config.fps);
    if let Some(name) = &config.webcam_name {
        options = options.name(name.as_str());
    }
    let webcam = match Webcam::open(options) {
        Ok(webcam) => webcam,
        Err(e) => {
            log::error!("{e}");
            problems.push(Problem::NoVideo);
            return (None, problems);
        }
    };

    let spawned = match landmarker {
        Some(landmarker) => DetectionLoop::spawn(webcam, landmarker),
        None => DetectionLoop::spawn(webcam, NoExtractor),
    };
    match spawned {
        Ok(detection) => (Some(detection), problems),
        Err(e) => {
            log::error!("failed to spawn detection thread: {e}");
            problems.push(Problem::NoVideo);
            (None, problems)
        }
    }
}

/// Runs the application until its window is closed.
pub fn run(config: Config) -> anyhow::Result<()> {
    let (detection, problems) = start_detection(&config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 620.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title("Hand Signs"),
        ..Default::default()
    };

    eframe::run_native(
        "handsign",
        options,
        Box::new(move |_cc| Ok(Box::new(SignApp::new(config, detection, problems)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run application: {e}"))
}
