// Conversion driver for the GUI
// Planning and encoding run on a background thread, results come back over a channel

use super::{HeiyaApp, ProgressMessage};
use eframe::egui;
use heiya::dispatch::{plan_batch, run_batch, selection_has_directory, ExtensionSelection, ProgressEvent};
use heiya::utils::{display_name, warn_println};
use heiya::{ConversionConfig, ConversionEngine};
use std::path::PathBuf;
use std::sync::mpsc::channel;

impl HeiyaApp {
    /// "Convert" pressed: ask for extensions first when folders are involved
    pub fn request_conversion(&mut self, ctx: &egui::Context) {
        if self.targets.is_empty() {
            self.error_message = "Please select at least one output format".to_string();
            return;
        }

        self.error_message.clear();
        self.show_options = false;

        if selection_has_directory(&self.files) {
            self.show_extensions = true;
        } else {
            self.start_conversion(ctx);
        }
    }

    pub fn start_conversion(&mut self, ctx: &egui::Context) {
        if self.files.is_empty() {
            self.error_message = "Please select files or folders to convert".to_string();
            return;
        }

        // Save configuration before starting
        if let Err(e) = self.save_config() {
            warn_println(&format!("Could not save settings: {:#}", e));
        }

        // Clear previous state
        self.is_processing = true;
        self.progress = 0.0;
        self.eta = None;
        self.files_per_second = 0.0;
        self.processed_count = 0;
        self.total_count = 0;
        self.current_file = "Scanning...".to_string();
        self.error_message.clear();
        self.completion = None;

        let (tx, rx) = channel();
        self.progress_receiver = Some(rx);

        let paths = self.files.clone();
        let targets = self.targets;
        // Extensions only matter for folders
        let extensions = if selection_has_directory(&paths) {
            self.extensions.clone()
        } else {
            ExtensionSelection::none()
        };
        let config = ConversionConfig {
            output_dir: if self.output_dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(self.output_dir.trim()))
            },
            force: self.force,
            dry_run: self.dry_run,
            recursive: self.recursive,
            parallel_jobs: if self.jobs == 0 {
                num_cpus::get()
            } else {
                self.jobs
            },
            verbose: false,
            avif_quality: self.quality,
            avif_speed: self.speed,
            h265_crf: self.crf,
            h265_preset: self.preset.clone(),
        };
        let ctx = ctx.clone();

        std::thread::spawn(move || {
            let engine = ConversionEngine::new(config);
            let plan = plan_batch(&engine, &paths, targets, &extensions);

            if plan.is_empty() {
                let reasons: Vec<String> = plan
                    .ignored
                    .iter()
                    .map(|i| format!("{}: {}", display_name(&i.path), i.reason))
                    .collect();
                let message = if reasons.is_empty() {
                    "Nothing to convert with the selected formats".to_string()
                } else {
                    format!("Nothing to convert.\n{}", reasons.join("\n"))
                };
                let _ = tx.send(ProgressMessage::Error(message));
                ctx.request_repaint();
                return;
            }

            run_batch(&engine, &plan, |event| {
                let message = match event {
                    ProgressEvent::Started { total } => ProgressMessage::Progress {
                        current: 0,
                        total,
                        fraction: 0.0,
                        eta: None,
                        files_per_second: 0.0,
                        file: "Starting...".to_string(),
                    },
                    ProgressEvent::FileDone {
                        current,
                        total,
                        fraction,
                        eta,
                        files_per_second,
                        input,
                        ..
                    } => ProgressMessage::Progress {
                        current,
                        total,
                        fraction: fraction as f32,
                        eta,
                        files_per_second,
                        file: display_name(&input),
                    },
                    ProgressEvent::Finished(summary) => ProgressMessage::Complete(summary),
                };
                let _ = tx.send(message);
                ctx.request_repaint();
            });
        });
    }

    /// Check for progress updates from the background thread
    pub fn check_progress(&mut self) {
        let Some(receiver) = &self.progress_receiver else {
            return;
        };

        // Collect all messages in a vector first to avoid borrowing issues
        let messages: Vec<ProgressMessage> = receiver.try_iter().collect();

        let mut should_clear_receiver = false;
        for msg in messages {
            match msg {
                ProgressMessage::Progress {
                    current,
                    total,
                    fraction,
                    eta,
                    files_per_second,
                    file,
                } => {
                    self.processed_count = current;
                    self.total_count = total;
                    self.current_file = file;
                    self.progress = fraction;
                    self.eta = eta;
                    self.files_per_second = files_per_second;
                }
                ProgressMessage::Complete(summary) => {
                    self.is_processing = false;
                    self.progress = 1.0;
                    self.completion = Some(summary);
                    should_clear_receiver = true;
                }
                ProgressMessage::Error(err) => {
                    self.is_processing = false;
                    self.error_message = err;
                    should_clear_receiver = true;
                }
            }
        }

        if should_clear_receiver {
            self.progress_receiver = None;
        }
    }
}
