//! Turns a user selection (paths + checkboxes) into conversion calls.
//!
//! Planning and execution are split so the caller knows the total number of
//! files before anything is encoded, which is what drives the progress bar.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::convert::{
    ConversionEngine, ConversionKind, ConversionOutcome, ConversionStatus, Encoder, FileReport,
};
use crate::formats::{ImageTarget, SourceFormat};
use crate::progress::BatchProgress;

/// Output formats ticked in the conversion options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSelection {
    pub avif: bool,
    pub heic: bool,
    pub h265: bool,
}

impl TargetSelection {
    pub fn is_empty(&self) -> bool {
        !self.avif && !self.heic && !self.h265
    }

    pub fn image_targets(&self) -> Vec<ImageTarget> {
        let mut targets = Vec::new();
        if self.avif {
            targets.push(ImageTarget::Avif);
        }
        if self.heic {
            targets.push(ImageTarget::Heic);
        }
        targets
    }
}

/// Source extensions picked up when scanning directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSelection {
    formats: Vec<SourceFormat>,
}

impl ExtensionSelection {
    pub fn all() -> Self {
        Self::from_formats(SourceFormat::all())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_formats(formats: impl IntoIterator<Item = SourceFormat>) -> Self {
        let mut selection = Self::none();
        for format in formats {
            selection.set(format, true);
        }
        selection
    }

    pub fn contains(&self, format: SourceFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn set(&mut self, format: SourceFormat, enabled: bool) {
        if enabled {
            if !self.contains(format) {
                self.formats.push(format);
            }
        } else {
            self.formats.retain(|f| *f != format);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn formats(&self) -> &[SourceFormat] {
        &self.formats
    }

    /// Comma separated, e.g. "jpg,mkv", as stored in config files
    pub fn to_extension_list(&self) -> String {
        self.formats
            .iter()
            .map(|f| f.extensions()[0])
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse(list: &str) -> Self {
        Self::from_formats(list.split(',').filter_map(SourceFormat::from_extension))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchStep {
    File {
        path: PathBuf,
        kind: ConversionKind,
    },
    Directory {
        dir: PathBuf,
        source: SourceFormat,
        kind: ConversionKind,
        files: usize,
    },
}

impl BatchStep {
    /// Number of files this step converts
    pub fn units(&self) -> usize {
        match self {
            BatchStep::File { .. } => 1,
            BatchStep::Directory { files, .. } => *files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredPath {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub steps: Vec<BatchStep>,
    pub ignored: Vec<IgnoredPath>,
}

impl BatchPlan {
    pub fn total_units(&self) -> usize {
        self.steps.iter().map(BatchStep::units).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    fn ignore(&mut self, path: &Path, reason: impl Into<String>) {
        self.ignored.push(IgnoredPath {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }
}

/// Directories need the extension selection before planning
pub fn selection_has_directory(paths: &[PathBuf]) -> bool {
    paths.iter().any(|p| p.is_dir())
}

/// Work out every conversion call for `paths`
///
/// Files are routed by their own extension; directories produce one step per
/// (ticked extension, ticked target) pair that actually has files in it.
pub fn plan_batch<E: Encoder>(
    engine: &ConversionEngine<E>,
    paths: &[PathBuf],
    targets: TargetSelection,
    extensions: &ExtensionSelection,
) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen = HashSet::new();

    for path in paths {
        if !seen.insert(path.clone()) {
            continue;
        }

        if path.is_dir() {
            plan_directory(engine, &mut plan, path, targets, extensions);
        } else if path.is_file() {
            plan_file(&mut plan, path, targets);
        } else {
            plan.ignore(path, "path does not exist");
        }
    }

    plan
}

fn plan_file(plan: &mut BatchPlan, path: &Path, targets: TargetSelection) {
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Image(_)) => {
            let image_targets = targets.image_targets();
            if image_targets.is_empty() {
                plan.ignore(path, "no image output format selected");
            }
            for target in image_targets {
                plan.steps.push(BatchStep::File {
                    path: path.to_path_buf(),
                    kind: ConversionKind::Image(target),
                });
            }
        }
        Some(SourceFormat::Video(_)) => {
            if targets.h265 {
                plan.steps.push(BatchStep::File {
                    path: path.to_path_buf(),
                    kind: ConversionKind::Video,
                });
            } else {
                plan.ignore(path, "H265 not selected");
            }
        }
        None => plan.ignore(path, "unsupported file type"),
    }
}

fn plan_directory<E: Encoder>(
    engine: &ConversionEngine<E>,
    plan: &mut BatchPlan,
    dir: &Path,
    targets: TargetSelection,
    extensions: &ExtensionSelection,
) {
    let steps_before = plan.steps.len();

    for &source in extensions.formats() {
        let kinds: Vec<ConversionKind> = match source {
            SourceFormat::Image(_) => targets
                .image_targets()
                .into_iter()
                .map(ConversionKind::Image)
                .collect(),
            SourceFormat::Video(_) if targets.h265 => vec![ConversionKind::Video],
            SourceFormat::Video(_) => Vec::new(),
        };
        if kinds.is_empty() {
            continue;
        }

        let files = match engine.discover_files(dir, source) {
            Ok(files) => files.len(),
            Err(e) => {
                plan.ignore(dir, format!("{:#}", e));
                return;
            }
        };
        if files == 0 {
            continue;
        }

        for kind in kinds {
            plan.steps.push(BatchStep::Directory {
                dir: dir.to_path_buf(),
                source,
                kind,
                files,
            });
        }
    }

    if plan.steps.len() == steps_before {
        plan.ignore(dir, "no matching files for the selected formats");
    }
}

/// Per-file status as reported to progress listeners
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Converted(PathBuf),
    Skipped(PathBuf),
    DryRun(PathBuf),
    Failed(String),
}

impl FileStatus {
    fn from_result(result: &Result<ConversionOutcome>) -> Self {
        match result {
            Ok(outcome) => match outcome.status {
                ConversionStatus::Converted => FileStatus::Converted(outcome.output.clone()),
                ConversionStatus::Skipped => FileStatus::Skipped(outcome.output.clone()),
                ConversionStatus::DryRun => FileStatus::DryRun(outcome.output.clone()),
            },
            Err(e) => FileStatus::Failed(format!("{:#}", e)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    FileDone {
        current: usize,
        total: usize,
        /// 0.0 to 1.0
        fraction: f64,
        eta: Option<Duration>,
        files_per_second: f64,
        input: PathBuf,
        status: FileStatus,
    },
    Finished(BatchSummary),
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failed: Vec<(PathBuf, String)>,
    pub ignored: Vec<IgnoredPath>,
    pub duration: Duration,
}

impl BatchSummary {
    fn record(&mut self, input: &Path, result: Result<ConversionOutcome>) {
        match result {
            Ok(outcome) => match outcome.status {
                ConversionStatus::Converted => self.converted += 1,
                ConversionStatus::Skipped => self.skipped += 1,
                ConversionStatus::DryRun => self.dry_run += 1,
            },
            Err(e) => self.failed.push((input.to_path_buf(), format!("{:#}", e))),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// One-line summary for the completion dialog
    pub fn message(&self) -> String {
        let failed = self.failed.len();

        if self.converted + self.skipped + self.dry_run + failed == 0 {
            "Nothing to convert".to_string()
        } else if self.dry_run > 0 && failed == 0 {
            format!(
                "✓ Dry run: {} files would be converted ({} skipped)",
                self.dry_run, self.skipped
            )
        } else if failed == 0 && self.skipped == 0 {
            format!("✓ Successfully converted {} files", self.converted)
        } else if failed == 0 {
            format!(
                "✓ Converted {} files ({} skipped)",
                self.converted, self.skipped
            )
        } else {
            format!(
                "Processed {} files ({} converted, {} failed, {} skipped)",
                self.converted + self.dry_run + failed + self.skipped,
                self.converted,
                failed,
                self.skipped
            )
        }
    }
}

/// Run every step of `plan` in order, reporting each finished file to `sink`
///
/// A failing file is recorded and the batch continues.
pub fn run_batch<E, F>(engine: &ConversionEngine<E>, plan: &BatchPlan, sink: F) -> BatchSummary
where
    E: Encoder,
    F: Fn(ProgressEvent) + Sync,
{
    let total = plan.total_units();
    let progress = BatchProgress::new(total);
    let mut summary = BatchSummary {
        total,
        ignored: plan.ignored.clone(),
        ..Default::default()
    };

    sink(ProgressEvent::Started { total });

    let report = |input: &Path, result: &Result<ConversionOutcome>| {
        let current = progress.increment();
        sink(ProgressEvent::FileDone {
            current,
            total,
            fraction: progress.fraction(),
            eta: progress.eta(),
            files_per_second: progress.items_per_second(),
            input: input.to_path_buf(),
            status: FileStatus::from_result(result),
        });
    };

    for step in &plan.steps {
        match step {
            BatchStep::File { path, kind } => {
                let result = match kind {
                    ConversionKind::Image(target) => engine.convert_image_to_hei(path, *target),
                    ConversionKind::Video => engine.video_to_h265(path),
                };
                report(path, &result);
                summary.record(path, result);
            }
            BatchStep::Directory {
                dir, source, kind, ..
            } => {
                let on_file = |r: &FileReport| report(&r.input, &r.result);
                let reports = match (source, kind) {
                    (SourceFormat::Image(source), ConversionKind::Image(target)) => {
                        engine.convert_image_in_dir_to_hei(dir, *source, *target, on_file)
                    }
                    (SourceFormat::Video(source), ConversionKind::Video) => {
                        engine.convert_video_in_dir_to_h265(dir, *source, on_file)
                    }
                    _ => Err(anyhow::anyhow!(
                        "Cannot convert {} files to {}",
                        source.label(),
                        kind.label()
                    )),
                };

                match reports {
                    Ok(reports) => {
                        for r in reports {
                            summary.record(&r.input, r.result);
                        }
                    }
                    Err(e) => summary.failed.push((dir.clone(), format!("{:#}", e))),
                }
            }
        }
    }

    summary.duration = progress.elapsed();
    sink(ProgressEvent::Finished(summary.clone()));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::testing::{touch, RecordingEncoder};
    use crate::convert::ConversionConfig;
    use crate::formats::{ImageSource, VideoSource};
    use std::sync::Mutex;
    use temp_dir::TempDir;

    fn engine() -> ConversionEngine<RecordingEncoder> {
        ConversionEngine::with_encoder(ConversionConfig::default(), RecordingEncoder::default())
    }

    const ALL: TargetSelection = TargetSelection {
        avif: true,
        heic: true,
        h265: true,
    };

    #[test]
    fn test_target_selection() {
        assert!(TargetSelection::default().is_empty());
        assert_eq!(
            ALL.image_targets(),
            vec![ImageTarget::Avif, ImageTarget::Heic]
        );
        let video_only = TargetSelection {
            h265: true,
            ..Default::default()
        };
        assert!(!video_only.is_empty());
        assert!(video_only.image_targets().is_empty());
    }

    #[test]
    fn test_extension_selection() {
        let mut selection = ExtensionSelection::none();
        assert!(selection.is_empty());

        selection.set(SourceFormat::Video(VideoSource::Mkv), true);
        selection.set(SourceFormat::Image(ImageSource::Jpeg), true);
        selection.set(SourceFormat::Image(ImageSource::Jpeg), true);
        assert_eq!(selection.formats().len(), 2);
        assert_eq!(selection.to_extension_list(), "mkv,jpg");

        selection.set(SourceFormat::Video(VideoSource::Mkv), false);
        assert!(!selection.contains(SourceFormat::Video(VideoSource::Mkv)));

        let parsed = ExtensionSelection::parse("tif, mov,bogus");
        assert!(parsed.contains(SourceFormat::Image(ImageSource::Tiff)));
        assert!(parsed.contains(SourceFormat::Video(VideoSource::Mov)));
        assert_eq!(parsed.formats().len(), 2);

        assert_eq!(ExtensionSelection::all().formats().len(), 6);
    }

    #[test]
    fn test_plan_files() {
        let dir = TempDir::new().unwrap();
        let photo = dir.child("photo.jpg");
        let scan = dir.child("scan.tif");
        let clip = dir.child("clip.mkv");
        let notes = dir.child("notes.txt");
        for p in [&photo, &scan, &clip, &notes] {
            touch(p);
        }

        let targets = TargetSelection {
            avif: true,
            heic: false,
            h265: true,
        };
        let plan = plan_batch(
            &engine(),
            &[photo.clone(), scan.clone(), clip.clone(), notes.clone(), dir.child("gone.png")],
            targets,
            &ExtensionSelection::none(),
        );

        assert_eq!(
            plan.steps,
            vec![
                BatchStep::File {
                    path: photo,
                    kind: ConversionKind::Image(ImageTarget::Avif)
                },
                BatchStep::File {
                    path: scan,
                    kind: ConversionKind::Image(ImageTarget::Avif)
                },
                BatchStep::File {
                    path: clip,
                    kind: ConversionKind::Video
                },
            ]
        );
        assert_eq!(plan.total_units(), 3);
        let ignored: Vec<_> = plan.ignored.iter().map(|i| i.path.clone()).collect();
        assert_eq!(ignored, vec![notes, dir.child("gone.png")]);
    }

    #[test]
    fn test_plan_file_without_matching_target() {
        let dir = TempDir::new().unwrap();
        let clip = dir.child("clip.mov");
        touch(&clip);

        let targets = TargetSelection {
            avif: true,
            ..Default::default()
        };
        let plan = plan_batch(&engine(), &[clip], targets, &ExtensionSelection::all());
        assert!(plan.is_empty());
        assert_eq!(plan.ignored[0].reason, "H265 not selected");
    }

    #[test]
    fn test_plan_directory() {
        let dir = TempDir::new().unwrap();
        touch(&dir.child("a.jpg"));
        touch(&dir.child("b.jpg"));
        touch(&dir.child("c.png"));
        touch(&dir.child("d.mp4"));

        let extensions = ExtensionSelection::from_formats([
            SourceFormat::Image(ImageSource::Jpeg),
            SourceFormat::Image(ImageSource::Tiff),
            SourceFormat::Video(VideoSource::Mp4),
        ]);
        let plan = plan_batch(&engine(), &[dir.path().to_path_buf()], ALL, &extensions);

        assert_eq!(
            plan.steps,
            vec![
                BatchStep::Directory {
                    dir: dir.path().to_path_buf(),
                    source: SourceFormat::Image(ImageSource::Jpeg),
                    kind: ConversionKind::Image(ImageTarget::Avif),
                    files: 2
                },
                BatchStep::Directory {
                    dir: dir.path().to_path_buf(),
                    source: SourceFormat::Image(ImageSource::Jpeg),
                    kind: ConversionKind::Image(ImageTarget::Heic),
                    files: 2
                },
                BatchStep::Directory {
                    dir: dir.path().to_path_buf(),
                    source: SourceFormat::Video(VideoSource::Mp4),
                    kind: ConversionKind::Video,
                    files: 1
                },
            ]
        );
        assert_eq!(plan.total_units(), 5);
        assert!(plan.ignored.is_empty());
    }

    #[test]
    fn test_plan_directory_without_matches() {
        let dir = TempDir::new().unwrap();
        touch(&dir.child("a.png"));

        let extensions = ExtensionSelection::from_formats([SourceFormat::Image(ImageSource::Jpeg)]);
        let plan = plan_batch(&engine(), &[dir.path().to_path_buf()], ALL, &extensions);
        assert!(plan.is_empty());
        assert_eq!(plan.ignored.len(), 1);
    }

    #[test]
    fn test_plan_skips_duplicate_paths() {
        let dir = TempDir::new().unwrap();
        let photo = dir.child("photo.png");
        touch(&photo);

        let targets = TargetSelection {
            heic: true,
            ..Default::default()
        };
        let plan = plan_batch(
            &engine(),
            &[photo.clone(), photo],
            targets,
            &ExtensionSelection::all(),
        );
        assert_eq!(plan.total_units(), 1);
    }

    #[test]
    fn test_selection_has_directory() {
        let dir = TempDir::new().unwrap();
        let photo = dir.child("photo.png");
        touch(&photo);

        assert!(!selection_has_directory(&[photo.clone()]));
        assert!(selection_has_directory(&[photo, dir.path().to_path_buf()]));
    }

    #[test]
    fn test_run_batch_reports_progress_and_failures() {
        let dir = TempDir::new().unwrap();
        let photos = dir.child("photos");
        touch(&photos.join("a.jpg"));
        touch(&photos.join("corrupt.jpg"));
        let clip = dir.child("clip.mkv");
        touch(&clip);
        touch(&dir.child("clip_h265.mp4"));

        let engine = engine();
        let plan = plan_batch(
            &engine,
            &[photos.clone(), clip.clone()],
            TargetSelection {
                avif: true,
                heic: false,
                h265: true,
            },
            &ExtensionSelection::all(),
        );
        assert_eq!(plan.total_units(), 3);

        let events = Mutex::new(Vec::new());
        let summary = run_batch(&engine, &plan, |event| events.lock().unwrap().push(event));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, photos.join("corrupt.jpg"));
        assert!(summary.has_failures());
        assert_eq!(
            summary.message(),
            "Processed 3 files (1 converted, 1 failed, 1 skipped)"
        );

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], ProgressEvent::Started { total: 3 }));
        assert!(matches!(events[4], ProgressEvent::Finished(_)));

        let currents: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::FileDone { current, .. } => Some(*current),
                _ => None,
            })
            .collect();
        assert_eq!(currents, vec![1, 2, 3]);

        match &events[3] {
            ProgressEvent::FileDone { fraction, eta, .. } => {
                assert!((fraction - 1.0).abs() < f64::EPSILON);
                assert_eq!(*eta, Some(Duration::ZERO));
            }
            other => panic!("unexpected event {:?}", other),
        }

        let clip_status = events.iter().find_map(|e| match e {
            ProgressEvent::FileDone { input, status, .. } if *input == clip => Some(status.clone()),
            _ => None,
        });
        assert_eq!(clip_status, Some(FileStatus::Skipped(dir.child("clip_h265.mp4"))));
    }

    #[test]
    fn test_run_batch_with_shared_output_name() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.child("a.jpg");
        let png = dir.child("a.png");
        touch(&jpg);
        touch(&png);

        let engine = ConversionEngine::with_encoder(
            ConversionConfig {
                force: true,
                ..Default::default()
            },
            RecordingEncoder::default(),
        );
        let targets = TargetSelection {
            avif: true,
            ..Default::default()
        };
        let plan = plan_batch(&engine, &[jpg, png.clone()], targets, &ExtensionSelection::none());
        let summary = run_batch(&engine, &plan, |_| {});

        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, png);
        assert!(summary.failed[0].1.contains("collides with"));
        assert_eq!(engine.encoder().calls().len(), 1);
    }

    #[test]
    fn test_run_empty_plan() {
        let summary = run_batch(&engine(), &BatchPlan::default(), |_| {});
        assert_eq!(summary.total, 0);
        assert_eq!(summary.message(), "Nothing to convert");
    }

    #[test]
    fn test_summary_messages() {
        let summary = BatchSummary {
            converted: 4,
            ..Default::default()
        };
        assert_eq!(summary.message(), "✓ Successfully converted 4 files");

        let summary = BatchSummary {
            converted: 4,
            skipped: 2,
            ..Default::default()
        };
        assert_eq!(summary.message(), "✓ Converted 4 files (2 skipped)");

        let summary = BatchSummary {
            dry_run: 3,
            ..Default::default()
        };
        assert_eq!(summary.message(), "✓ Dry run: 3 files would be converted (0 skipped)");
    }
}
