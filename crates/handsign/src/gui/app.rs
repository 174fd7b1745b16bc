use egui::{Color32, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};

use crate::{
    classifier::{
        job::{TrainEvent, TrainingJob},
        TrainConfig,
    },
    config::Config,
    error::TrainError,
    hand::tracking::{DetectionFrame, DetectionLoop},
    landmark::{HandPose, LandmarkVector, CONNECTIVITY},
    session::Session,
};

use super::Problem;

/// Label used by the "Capture B" button.
const FIXED_LABEL: &str = "B";

enum Action {
    Capture(String),
    Train,
    Predict,
    Reset,
}

/// The `eframe` application.
///
/// Owns the [`Session`] and applies detection and training results to it once per frame.
pub struct SignApp {
    session: Session,
    detection: Option<DetectionLoop>,
    training: Option<TrainingJob>,
    train_config: TrainConfig,
    label: String,
    frame: Option<DetectionFrame>,
    texture: Option<TextureHandle>,
    problems: Vec<Problem>,
}

impl SignApp {
    pub fn new(config: Config, detection: Option<DetectionLoop>, problems: Vec<Problem>) -> Self {
        Self {
            session: Session::new(),
            detection,
            training: None,
            train_config: config.train,
            label: String::new(),
            frame: None,
            texture: None,
            problems,
        }
    }

    fn poll_detection(&mut self, ctx: &egui::Context) {
        let Some(detection) = &mut self.detection else {
            return;
        };

        if let Some(frame) = detection.latest() {
            self.session.update_landmarks(frame.landmarks.clone());

            let image = egui::ColorImage::from_rgba_unmultiplied(
                [frame.image.width() as usize, frame.image.height() as usize],
                frame.image.data(),
            );
            match &mut self.texture {
                Some(texture) => texture.set(image, TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ctx.load_texture("camera", image, TextureOptions::LINEAR))
                }
            }
            self.frame = Some(frame);
        } else if detection.is_finished() {
            log::warn!("detection loop has stopped");
            self.detection = None;
            self.session.update_landmarks(LandmarkVector::empty());
            if !self.problems.contains(&Problem::NoVideo) {
                self.problems.push(Problem::NoVideo);
            }
        }
    }

    fn poll_training(&mut self) {
        let Some(job) = &mut self.training else {
            return;
        };

        for event in job.poll() {
            match event {
                TrainEvent::Epoch(stats) => self.session.record_epoch(stats),
                TrainEvent::Finished(result) => self.session.finish_training(result),
            }
        }
        if job.is_finished() {
            self.training = None;
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Capture(label) => {
                // Without a camera, a detection pass can only ever come back empty.
                let result = match &mut self.detection {
                    Some(detection) => self.session.capture_sign(&label, detection),
                    None => self
                        .session
                        .capture_sign(&label, &mut LandmarkVector::empty),
                };
                // Incomplete landmarks are already logged and otherwise ignored.
                result.ok();
            }
            Action::Train => self.start_training(),
            Action::Predict => {
                self.session.predict_sign();
            }
            Action::Reset => {
                self.session.reset();
                self.label.clear();
            }
        }
    }

    fn start_training(&mut self) {
        let dataset = match self.session.begin_training() {
            Ok(dataset) => dataset,
            Err(e) => {
                log::warn!("not training: {e}");
                return;
            }
        };
        match TrainingJob::spawn(dataset, self.train_config.clone()) {
            Ok(job) => self.training = Some(job),
            Err(e) => {
                log::error!("failed to spawn training thread: {e}");
                self.session.finish_training(Err(TrainError::Aborted));
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) -> Option<Action> {
        let mut action = None;

        ui.heading("Capture");
        ui.horizontal(|ui| {
            ui.label("Label:");
            ui.text_edit_singleline(&mut self.label);
        });
        ui.horizontal(|ui| {
            if ui.button("Capture Sign").clicked() {
                action = Some(Action::Capture(self.label.clone()));
            }
            if ui.button("Capture B").clicked() {
                action = Some(Action::Capture(FIXED_LABEL.to_string()));
            }
        });

        ui.separator();
        ui.heading("Model");
        ui.horizontal(|ui| {
            let can_train = !self.session.is_training();
            if ui
                .add_enabled(can_train, egui::Button::new("Train Model"))
                .clicked()
            {
                action = Some(Action::Train);
            }
            if ui.button("Predict Now").clicked() {
                action = Some(Action::Predict);
            }
        });
        if ui.button("Reset").clicked() {
            action = Some(Action::Reset);
        }

        ui.separator();
        ui.heading("Status");
        ui.label(format!("Prediction: {}", prediction_text(&self.session)));
        ui.label(format!("Landmarks: {}", self.session.landmark_count()));
        ui.label(format!("Samples: {}", self.session.dataset_len()));
        ui.label(if self.session.is_trained() {
            "Model: trained"
        } else {
            "Model: not trained"
        });
        if let Some(text) = training_text(&self.session) {
            ui.label(text);
        }
        if self.session.is_training() {
            let fraction = self
                .session
                .last_epoch()
                .map_or(0.0, |s| s.epoch as f32 / s.epochs.max(1) as f32);
            ui.add(egui::ProgressBar::new(fraction).show_percentage());
        }
        for problem in &self.problems {
            ui.colored_label(Color32::RED, problem.message());
        }

        action
    }

    fn video(&self, ui: &mut egui::Ui) {
        let (Some(texture), Some(frame)) = (&self.texture, &self.frame) else {
            ui.centered_and_justified(|ui| {
                if self.detection.is_some() {
                    ui.label("Waiting for camera...");
                } else {
                    ui.label(Problem::NoVideo.message());
                }
            });
            return;
        };

        let image_size = Vec2::new(frame.image.width() as f32, frame.image.height() as f32);
        let available = ui.available_size();
        let (rect, _) = ui.allocate_exact_size(available, Sense::hover());
        let image_rect = Rect::from_center_size(rect.center(), fit_size(available, image_size));

        let painter = ui.painter_at(rect);
        painter.image(
            texture.id(),
            image_rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
        if let Some(pose) = &frame.pose {
            draw_pose(&painter, pose, image_rect, image_size);
        }
    }
}

impl eframe::App for SignApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();
        self.poll_detection(ctx);
        self.poll_training();

        let mut action = None;
        egui::SidePanel::right("controls")
            .resizable(false)
            .min_width(240.0)
            .show(ctx, |ui| action = self.controls(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.video(ui));

        if let Some(action) = action {
            self.apply(action);
        }
    }
}

/// Draws the hand skeleton. `image_size` is the size of the frame the pose was detected in.
fn draw_pose(painter: &egui::Painter, pose: &HandPose, image_rect: Rect, image_size: Vec2) {
    let to_screen = |[x, y, _]: [f32; 3]| {
        image_rect.min + Vec2::new(x / image_size.x, y / image_size.y) * image_rect.size()
    };

    let stroke = Stroke::new(2.0, Color32::from_rgb(0, 220, 90));
    for &(a, b) in CONNECTIVITY {
        painter.line_segment(
            [to_screen(pose.position(a)), to_screen(pose.position(b))],
            stroke,
        );
    }
    for &position in pose.positions() {
        painter.circle_filled(to_screen(position), 3.0, Color32::from_rgb(255, 60, 60));
    }
}

/// Largest size with the aspect ratio of `content` that fits into `available`.
fn fit_size(available: Vec2, content: Vec2) -> Vec2 {
    if content.x <= 0.0 || content.y <= 0.0 {
        return Vec2::ZERO;
    }
    let scale = (available.x / content.x).min(available.y / content.y);
    content * scale
}

fn prediction_text(session: &Session) -> String {
    match session.prediction() {
        Some(p) => format!("{} ({:.0}%)", p.label, p.confidence * 100.0),
        None => "Detecting...".to_string(),
    }
}

fn training_text(session: &Session) -> Option<String> {
    let stats = session.last_epoch();
    match (session.is_training(), stats) {
        (true, None) => Some("Training...".to_string()),
        (true, Some(s)) => Some(format!(
            "Training: epoch {}/{}, loss {:.3}, accuracy {:.0}%",
            s.epoch,
            s.epochs,
            s.loss,
            s.accuracy * 100.0
        )),
        (false, Some(s)) => Some(match s.val_accuracy {
            Some(val) => format!(
                "Last run: accuracy {:.0}%, validation {:.0}%",
                s.accuracy * 100.0,
                val * 100.0
            ),
            None => format!("Last run: accuracy {:.0}%", s.accuracy * 100.0),
        }),
        (false, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EpochStats;

    #[test]
    fn fit_keeps_aspect_ratio() {
        let size = fit_size(Vec2::new(800.0, 800.0), Vec2::new(640.0, 480.0));
        assert_eq!(size, Vec2::new(800.0, 600.0));
        let size = fit_size(Vec2::new(100.0, 30.0), Vec2::new(640.0, 480.0));
        assert_eq!(size, Vec2::new(40.0, 30.0));
        assert_eq!(fit_size(Vec2::splat(10.0), Vec2::ZERO), Vec2::ZERO);
    }

    #[test]
    fn status_texts() {
        let mut session = Session::new();
        assert_eq!(prediction_text(&session), "Detecting...");
        assert_eq!(training_text(&session), None);

        session.record_epoch(EpochStats {
            epoch: 3,
            epochs: 100,
            loss: 0.5,
            accuracy: 0.75,
            val_loss: None,
            val_accuracy: None,
        });
        assert_eq!(
            training_text(&session).as_deref(),
            Some("Last run: accuracy 75%")
        );
    }
}
