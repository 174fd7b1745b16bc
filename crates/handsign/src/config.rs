//! Environment-driven settings.

use std::{
    env::{self, VarError},
    fmt::Display,
    path::PathBuf,
    str::FromStr,
};

use crate::{classifier::TrainConfig, hand::landmark::HandLandmarker};

const ENV_VAR_WEBCAM_NAME: &str = "HANDSIGN_WEBCAM_NAME";
const ENV_VAR_FPS: &str = "HANDSIGN_FPS";
const ENV_VAR_LANDMARK_MODEL: &str = "HANDSIGN_LANDMARK_MODEL";
const ENV_VAR_PRESENCE_THRESHOLD: &str = "HANDSIGN_PRESENCE_THRESHOLD";
const ENV_VAR_EPOCHS: &str = "HANDSIGN_EPOCHS";
const ENV_VAR_BATCH_SIZE: &str = "HANDSIGN_BATCH_SIZE";
const ENV_VAR_LEARNING_RATE: &str = "HANDSIGN_LEARNING_RATE";
const ENV_VAR_SEED: &str = "HANDSIGN_SEED";

const DEFAULT_FPS: u32 = 30;
const DEFAULT_LANDMARK_MODEL: &str = "3rdparty/onnx/hand_landmark_full.onnx";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Name of the webcam to open. The first usable device is used if unset.
    pub webcam_name: Option<String>,
    pub fps: u32,
    /// Path to the ONNX hand landmark network.
    pub landmark_model: PathBuf,
    pub presence_threshold: f32,
    pub train: TrainConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webcam_name: None,
            fps: DEFAULT_FPS,
            landmark_model: PathBuf::from(DEFAULT_LANDMARK_MODEL),
            presence_threshold: HandLandmarker::DEFAULT_PRESENCE_THRESHOLD,
            train: TrainConfig::default(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HANDSIGN_WEBCAM_NAME` | first usable device |
    /// | `HANDSIGN_FPS` | 30 |
    /// | `HANDSIGN_LANDMARK_MODEL` | `3rdparty/onnx/hand_landmark_full.onnx` |
    /// | `HANDSIGN_PRESENCE_THRESHOLD` | 0.5 |
    /// | `HANDSIGN_EPOCHS` | 100 |
    /// | `HANDSIGN_BATCH_SIZE` | 16 |
    /// | `HANDSIGN_LEARNING_RATE` | 0.0001 |
    /// | `HANDSIGN_SEED` | 42 |
    ///
    /// Values that can't be parsed are logged and replaced by their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(s)) => {
                log::error!(
                    "invalid value set for `{name}` variable: {}; ignoring",
                    s.to_string_lossy()
                );
                None
            }
        })
    }

    /// Builds the configuration from a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let train = TrainConfig {
            epochs: parse_var(&lookup, ENV_VAR_EPOCHS, defaults.train.epochs),
            batch_size: parse_var(&lookup, ENV_VAR_BATCH_SIZE, defaults.train.batch_size),
            learning_rate: parse_var(&lookup, ENV_VAR_LEARNING_RATE, defaults.train.learning_rate),
            seed: parse_var(&lookup, ENV_VAR_SEED, defaults.train.seed),
            ..defaults.train
        };

        Self {
            webcam_name: lookup(ENV_VAR_WEBCAM_NAME).filter(|name| !name.is_empty()),
            fps: parse_var(&lookup, ENV_VAR_FPS, defaults.fps),
            landmark_model: lookup(ENV_VAR_LANDMARK_MODEL)
                .filter(|path| !path.is_empty())
                .map_or(defaults.landmark_model, PathBuf::from),
            presence_threshold: parse_var(
                &lookup,
                ENV_VAR_PRESENCE_THRESHOLD,
                defaults.presence_threshold,
            ),
            train,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(value) = lookup(name) else {
        return default;
    };
    match value.trim().parse() {
        Ok(v) => v,
        Err(e) => {
            log::error!("invalid value set for `{name}` variable: '{value}' ({e}); using {default}");
            default
        }
    }
}
