use eframe::egui;
use heiya::cli::{DEFAULT_CRF, DEFAULT_PRESET, DEFAULT_QUALITY, DEFAULT_SPEED};
use heiya::dispatch::{BatchSummary, ExtensionSelection, TargetSelection};
use heiya::formats::SourceFormat;
use heiya::utils::{format_duration, warn_println};
use heiya::ConfigFile;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

#[path = "app_processing.rs"]
mod app_processing;

const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "tif", "tiff", "mp4", "mkv", "mov",
];

pub struct HeiyaApp {
    // Selection
    files: Vec<PathBuf>,
    highlighted: BTreeSet<usize>,
    last_directory: Option<PathBuf>,

    // Conversion options
    targets: TargetSelection,
    extensions: ExtensionSelection,

    // Advanced options
    output_dir: String,
    recursive: bool,
    force: bool,
    dry_run: bool,
    jobs: usize,
    quality: f32,
    speed: u8,
    crf: u8,
    preset: String,

    // Dialogs
    show_options: bool,
    show_extensions: bool,

    // Processing state
    is_processing: bool,
    progress: f32,
    eta: Option<Duration>,
    files_per_second: f64,
    current_file: String,
    processed_count: usize,
    total_count: usize,

    // Results
    completion: Option<BatchSummary>,
    error_message: String,

    // Communication channel for background processing
    progress_receiver: Option<Receiver<ProgressMessage>>,

    config_path: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) enum ProgressMessage {
    Progress {
        current: usize,
        total: usize,
        fraction: f32,
        eta: Option<Duration>,
        files_per_second: f64,
        file: String,
    },
    Complete(BatchSummary),
    Error(String),
}

/// Saved settings live in the platform config directory
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("heiya").join("config.json"))
}

impl HeiyaApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self {
            files: Vec::new(),
            highlighted: BTreeSet::new(),
            last_directory: None,
            targets: TargetSelection::default(),
            extensions: ExtensionSelection::none(),
            output_dir: String::new(),
            recursive: false,
            force: false,
            dry_run: false,
            jobs: 1,
            quality: DEFAULT_QUALITY,
            speed: DEFAULT_SPEED,
            crf: DEFAULT_CRF,
            preset: DEFAULT_PRESET.to_string(),
            show_options: false,
            show_extensions: false,
            is_processing: false,
            progress: 0.0,
            eta: None,
            files_per_second: 0.0,
            current_file: String::new(),
            processed_count: 0,
            total_count: 0,
            completion: None,
            error_message: String::new(),
            progress_receiver: None,
            config_path: default_config_path(),
        };
        app.load_config();
        app
    }

    fn load_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        if !path.exists() {
            return;
        }

        match ConfigFile::load(&path) {
            Ok(config) => self.apply_config(config),
            Err(e) => warn_println(&format!("Ignoring saved settings: {:#}", e)),
        }
    }

    fn apply_config(&mut self, config: ConfigFile) {
        self.targets = TargetSelection {
            avif: config.avif.unwrap_or(false),
            heic: config.heic.unwrap_or(false),
            h265: config.h265.unwrap_or(false),
        };
        if let Some(ext) = config.extensions {
            self.extensions = ExtensionSelection::parse(&ext);
        }
        self.output_dir = config.output_dir.unwrap_or_default();
        self.recursive = config.recursive.unwrap_or(false);
        self.force = config.force.unwrap_or(false);
        self.dry_run = config.dry_run.unwrap_or(false);
        self.jobs = config.jobs.unwrap_or(1);
        self.quality = config.quality.unwrap_or(DEFAULT_QUALITY);
        self.speed = config.speed.unwrap_or(DEFAULT_SPEED);
        self.crf = config.crf.unwrap_or(DEFAULT_CRF);
        self.preset = config.preset.unwrap_or_else(|| DEFAULT_PRESET.to_string());
        self.last_directory = config.last_directory.map(PathBuf::from);
    }

    pub(crate) fn save_config(&self) -> anyhow::Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };

        let config = ConfigFile {
            avif: Some(self.targets.avif),
            heic: Some(self.targets.heic),
            h265: Some(self.targets.h265),
            extensions: Some(self.extensions.to_extension_list()),
            output_dir: (!self.output_dir.is_empty()).then(|| self.output_dir.clone()),
            recursive: Some(self.recursive),
            force: Some(self.force),
            dry_run: Some(self.dry_run),
            jobs: Some(self.jobs),
            quality: Some(self.quality),
            speed: Some(self.speed),
            crf: Some(self.crf),
            preset: Some(self.preset.clone()),
            last_directory: self
                .last_directory
                .as_ref()
                .map(|p| p.display().to_string()),
        };
        config.save(path)
    }

    fn add_path(&mut self, path: PathBuf) {
        if !(path.is_file() || path.is_dir()) || self.files.contains(&path) {
            return;
        }
        let parent = if path.is_dir() {
            Some(path.clone())
        } else {
            path.parent().map(|p| p.to_path_buf())
        };
        if parent.is_some() {
            self.last_directory = parent;
        }
        self.files.push(path);
    }

    fn file_dialog(&self) -> rfd::FileDialog {
        let dialog = rfd::FileDialog::new();
        match &self.last_directory {
            Some(dir) => dialog.set_directory(dir),
            None => dialog,
        }
    }

    fn select_files(&mut self) {
        if let Some(paths) = self
            .file_dialog()
            .add_filter("Images and videos", MEDIA_EXTENSIONS)
            .pick_files()
        {
            for path in paths {
                self.add_path(path);
            }
        }
    }

    fn select_folder(&mut self) {
        if let Some(path) = self.file_dialog().pick_folder() {
            self.add_path(path);
        }
    }

    fn delete_selected(&mut self) {
        // Highest index first so earlier indices stay valid
        for index in self.highlighted.iter().rev() {
            if *index < self.files.len() {
                self.files.remove(*index);
            }
        }
        self.highlighted.clear();
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            if let Some(path) = file.path {
                self.add_path(path);
            }
        }
    }

    fn render_file_selection(&mut self, ui: &mut egui::Ui) {
        ui.label("Drag and drop files/folders or click the button to select files");
        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .max_height(ui.available_height() - 70.0)
            .show(ui, |ui| {
                if self.files.is_empty() {
                    ui.weak("No files selected");
                }
                let mut clicked = None;
                for (index, path) in self.files.iter().enumerate() {
                    let text = if path.is_dir() {
                        format!("📁 {}", path.display())
                    } else {
                        path.display().to_string()
                    };
                    if ui
                        .selectable_label(self.highlighted.contains(&index), text)
                        .clicked()
                    {
                        clicked = Some(index);
                    }
                }
                if let Some(index) = clicked {
                    if !self.highlighted.remove(&index) {
                        self.highlighted.insert(index);
                    }
                }
            });

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Select Files").clicked() {
                self.select_files();
            }
            if ui.button("Select Folder").clicked() {
                self.select_folder();
            }
            if ui
                .add_enabled(!self.highlighted.is_empty(), egui::Button::new("Delete Selected"))
                .clicked()
            {
                self.delete_selected();
            }
        });

        let next = egui::Button::new("Next").min_size(egui::vec2(120.0, 28.0));
        if ui
            .add_enabled(!self.files.is_empty() && !self.is_processing, next)
            .clicked()
        {
            self.error_message.clear();
            self.show_options = true;
        }
    }

    fn render_options_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_options;
        egui::Window::new("Select Conversion Options")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label("Conversion Options");
                ui.checkbox(&mut self.targets.avif, "AVIF");
                ui.checkbox(&mut self.targets.heic, "HEIC");
                ui.checkbox(&mut self.targets.h265, "H265");

                egui::CollapsingHeader::new("Advanced").show(ui, |ui| {
                    self.render_advanced_options(ui);
                });

                if !self.error_message.is_empty() {
                    ui.colored_label(egui::Color32::RED, &self.error_message);
                }

                ui.add_space(6.0);
                if ui.button("Convert").clicked() {
                    self.request_conversion(ui.ctx());
                }
            });
        self.show_options = open && self.show_options;
    }

    fn render_advanced_options(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Output folder:");
            ui.text_edit_singleline(&mut self.output_dir);
            if ui.button("Browse...").clicked() {
                if let Some(path) = self.file_dialog().pick_folder() {
                    self.output_dir = path.display().to_string();
                }
            }
        });
        ui.label("(Leave empty to write next to each source file)");

        ui.horizontal(|ui| {
            ui.checkbox(&mut self.force, "Overwrite existing outputs");
            ui.checkbox(&mut self.dry_run, "Dry run (simulate only)");
        });
        ui.checkbox(&mut self.recursive, "Include subfolders");

        ui.horizontal(|ui| {
            ui.label("Image quality:");
            ui.add(egui::Slider::new(&mut self.quality, 1.0..=100.0).step_by(1.0));
        });
        ui.horizontal(|ui| {
            ui.label("AVIF speed:");
            ui.add(egui::DragValue::new(&mut self.speed).speed(1).range(1..=10));
        });
        ui.horizontal(|ui| {
            ui.label("H.265 CRF:");
            ui.add(egui::DragValue::new(&mut self.crf).speed(1).range(0..=51));
            ui.label("Preset:");
            egui::ComboBox::from_id_salt("h265_preset")
                .selected_text(self.preset.clone())
                .show_ui(ui, |ui| {
                    for preset in ["ultrafast", "veryfast", "fast", "medium", "slow", "veryslow"] {
                        ui.selectable_value(&mut self.preset, preset.to_string(), preset);
                    }
                });
        });
        ui.horizontal(|ui| {
            ui.label("Parallel jobs:");
            ui.add(egui::DragValue::new(&mut self.jobs).speed(1).range(0..=32));
        });
        ui.label("(0 = auto-detect CPU cores)");
    }

    fn render_extensions_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_extensions;
        egui::Window::new("Select File Extensions")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("extension_grid")
                    .num_columns(2)
                    .spacing([40.0, 6.0])
                    .show(ui, |ui| {
                        for (i, format) in SourceFormat::all().into_iter().enumerate() {
                            let mut checked = self.extensions.contains(format);
                            if ui.checkbox(&mut checked, format.label()).changed() {
                                self.extensions.set(format, checked);
                            }
                            if i % 2 == 1 {
                                ui.end_row();
                            }
                        }
                    });

                if !self.error_message.is_empty() {
                    ui.colored_label(egui::Color32::RED, &self.error_message);
                }

                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    if self.extensions.is_empty() {
                        self.error_message = "Please select at least one extension".to_string();
                    } else {
                        self.show_extensions = false;
                        self.start_conversion(ui.ctx());
                    }
                }
            });
        self.show_extensions = open && self.show_extensions;
    }

    fn render_progress(&mut self, ui: &mut egui::Ui) {
        if !self.is_processing {
            return;
        }

        ui.label(format!(
            "Converting: {}/{}",
            self.processed_count, self.total_count
        ));
        ui.label(&self.current_file);
        if let Some(eta) = self.eta {
            ui.weak(format!(
                "About {} left ({:.1} files/s)",
                format_duration(eta),
                self.files_per_second
            ));
        }

        let progress_bar = egui::ProgressBar::new(self.progress)
            .show_percentage()
            .animate(true);
        ui.add(progress_bar);
    }

    fn render_completion_dialog(&mut self, ctx: &egui::Context) {
        let Some(summary) = &self.completion else {
            return;
        };

        let mut close = false;
        egui::Window::new("Conversion Finished")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(summary.message());

                if !summary.failed.is_empty() {
                    ui.separator();
                    ui.colored_label(egui::Color32::RED, "Failed:");
                    egui::ScrollArea::vertical()
                        .max_height(150.0)
                        .show(ui, |ui| {
                            for (path, error) in &summary.failed {
                                ui.label(format!("{}: {}", path.display(), error));
                            }
                        });
                }

                if !summary.ignored.is_empty() {
                    ui.separator();
                    ui.label("Ignored:");
                    for ignored in &summary.ignored {
                        ui.weak(format!("{} ({})", ignored.path.display(), ignored.reason));
                    }
                }

                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });

        if close {
            self.completion = None;
        }
    }
}

impl eframe::App for HeiyaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for progress updates from background thread
        self.check_progress();

        let dialog_open =
            self.show_options || self.show_extensions || self.completion.is_some() || self.is_processing;
        if !dialog_open {
            self.handle_dropped_files(ctx);
        }

        egui::TopBottomPanel::bottom("progress_panel").show(ctx, |ui| {
            self.render_progress(ui);
            if !self.is_processing && !self.show_options && !self.error_message.is_empty() {
                ui.colored_label(egui::Color32::RED, &self.error_message);
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!dialog_open, |ui| {
                self.render_file_selection(ui);
            });

            if ctx.input(|i| !i.raw.hovered_files.is_empty()) {
                ui.centered_and_justified(|ui| {
                    ui.heading("Drop files or folders to add them");
                });
            }
        });

        self.render_options_window(ctx);
        self.render_extensions_window(ctx);
        self.render_completion_dialog(ctx);

        // Request repaint if processing
        if self.is_processing {
            ctx.request_repaint();
        }
    }
}
