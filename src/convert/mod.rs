pub mod avif;
pub mod encoder;
pub mod ffmpeg;
pub mod heic;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::formats::{ImageSource, ImageTarget, SourceFormat, VideoSource};
use crate::utils::{display_name, verbose_println};

pub use encoder::{Encoder, ToolchainEncoder};

/// Suffix appended to video stems so an `.mp4` source is never overwritten
pub const H265_SUFFIX: &str = "_h265";

#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Write outputs here instead of next to the source
    pub output_dir: Option<PathBuf>,
    pub force: bool,
    pub dry_run: bool,
    pub recursive: bool,
    pub parallel_jobs: usize,
    pub verbose: bool,
    pub avif_quality: f32,
    pub avif_speed: u8,
    pub h265_crf: u8,
    pub h265_preset: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            force: false,
            dry_run: false,
            recursive: false,
            parallel_jobs: 1,
            verbose: false,
            avif_quality: crate::cli::DEFAULT_QUALITY,
            avif_speed: crate::cli::DEFAULT_SPEED,
            h265_crf: crate::cli::DEFAULT_CRF,
            h265_preset: crate::cli::DEFAULT_PRESET.to_string(),
        }
    }
}

/// What a single file is turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    Image(ImageTarget),
    Video,
}

impl ConversionKind {
    pub fn label(self) -> &'static str {
        match self {
            ConversionKind::Image(ImageTarget::Avif) => "AVIF",
            ConversionKind::Image(ImageTarget::Heic) => "HEIC",
            ConversionKind::Video => "H.265",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStatus {
    Converted,
    /// Output already existed and `force` was off
    Skipped,
    /// Nothing written, `dry_run` was on
    DryRun,
}

#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: ConversionStatus,
    pub duration: Duration,
}

/// Result for one file of a directory conversion
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub result: Result<ConversionOutcome>,
}

/// Runs conversions for one batch
///
/// Every output path is claimed by the first input that maps to it; a later
/// input with the same output (`a.jpg` and `a.png` both to `a.avif`) fails
/// instead of overwriting or being reported as skipped. Build one engine per
/// batch.
pub struct ConversionEngine<E: Encoder = ToolchainEncoder> {
    config: ConversionConfig,
    encoder: E,
    claimed: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl ConversionEngine<ToolchainEncoder> {
    pub fn new(config: ConversionConfig) -> Self {
        let encoder = ToolchainEncoder::from_config(&config);
        Self::with_encoder(config, encoder)
    }
}

impl<E: Encoder> ConversionEngine<E> {
    pub fn with_encoder(config: ConversionConfig, encoder: E) -> Self {
        Self {
            config,
            encoder,
            claimed: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// List the files in `dir` that belong to `source`, sorted
    pub fn discover_files(&self, dir: &Path, source: SourceFormat) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {}", dir.display());
        }

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).follow_links(false).max_depth(max_depth) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if entry.file_type().is_file() && source.matches(path) && !self.is_own_output(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        verbose_println(
            self.config.verbose,
            &format!("Found {} {} files in {}", files.len(), source.label(), dir.display()),
        );
        Ok(files)
    }

    /// Outputs written into a scanned tree must not be picked up again
    fn is_own_output(&self, path: &Path) -> bool {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(|stem| stem.ends_with(H265_SUFFIX))
            .unwrap_or(false)
            && SourceFormat::Video(VideoSource::Mp4).matches(path)
    }

    /// Where the converted version of `input` goes
    pub fn output_path_for(&self, input: &Path, kind: ConversionKind) -> PathBuf {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");

        let filename = match kind {
            ConversionKind::Image(target) => format!("{}.{}", stem, target.extension()),
            ConversionKind::Video => format!("{}{}.mp4", stem, H265_SUFFIX),
        };

        match &self.config.output_dir {
            Some(dir) => dir.join(filename),
            None => input.with_file_name(filename),
        }
    }

    /// Reserve `output` for `input`, failing if another input already has it
    fn claim_output(&self, input: &Path, output: &Path) -> Result<()> {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match claimed.get(output) {
            Some(owner) if owner != input => anyhow::bail!(
                "Output {} collides with {}",
                output.display(),
                owner.display()
            ),
            Some(_) => Ok(()),
            None => {
                claimed.insert(output.to_path_buf(), input.to_path_buf());
                Ok(())
            }
        }
    }

    fn convert_file(&self, input: &Path, kind: ConversionKind) -> Result<ConversionOutcome> {
        let start = Instant::now();
        let output = self.output_path_for(input, kind);
        self.claim_output(input, &output)?;

        let outcome = |status| ConversionOutcome {
            input: input.to_path_buf(),
            output: output.clone(),
            status,
            duration: start.elapsed(),
        };

        if output.exists() && !self.config.force {
            verbose_println(
                self.config.verbose,
                &format!("Skipping {} (exists: {})", display_name(input), output.display()),
            );
            return Ok(outcome(ConversionStatus::Skipped));
        }

        if self.config.dry_run {
            verbose_println(
                self.config.verbose,
                &format!("Would convert {} -> {}", input.display(), output.display()),
            );
            return Ok(outcome(ConversionStatus::DryRun));
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }

        verbose_println(
            self.config.verbose,
            &format!("Converting {} to {}", input.display(), kind.label()),
        );

        let encoded = match kind {
            ConversionKind::Image(target) => self.encoder.encode_image(input, &output, target),
            ConversionKind::Video => self.encoder.encode_video(input, &output),
        };

        if let Err(e) = encoded {
            // Never leave a half-written file behind
            let _ = fs::remove_file(&output);
            return Err(e);
        }

        Ok(outcome(ConversionStatus::Converted))
    }

    fn convert_dir<F>(
        &self,
        dir: &Path,
        source: SourceFormat,
        kind: ConversionKind,
        on_file: F,
    ) -> Result<Vec<FileReport>>
    where
        F: Fn(&FileReport) + Sync,
    {
        let files = self.discover_files(dir, source)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parallel_jobs.max(1))
            .build()
            .context("Failed to initialize thread pool")?;

        let reports = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let report = FileReport {
                        input: file.clone(),
                        result: self.convert_file(file, kind),
                    };
                    on_file(&report);
                    report
                })
                .collect()
        });

        Ok(reports)
    }

    /// Convert one JPEG/PNG/TIFF file to AVIF or HEIC
    pub fn convert_image_to_hei(&self, path: &Path, target: ImageTarget) -> Result<ConversionOutcome> {
        if !path.is_file() {
            anyhow::bail!("Not a file: {}", path.display());
        }
        match SourceFormat::from_path(path) {
            Some(SourceFormat::Image(_)) => self.convert_file(path, ConversionKind::Image(target)),
            _ => anyhow::bail!("Unsupported image format: {}", path.display()),
        }
    }

    /// Convert every `source` image in `dir` to `target`
    pub fn convert_image_in_dir_to_hei<F>(
        &self,
        dir: &Path,
        source: ImageSource,
        target: ImageTarget,
        on_file: F,
    ) -> Result<Vec<FileReport>>
    where
        F: Fn(&FileReport) + Sync,
    {
        self.convert_dir(
            dir,
            SourceFormat::Image(source),
            ConversionKind::Image(target),
            on_file,
        )
    }

    /// Re-encode one MP4/MKV/MOV file to H.265
    pub fn video_to_h265(&self, path: &Path) -> Result<ConversionOutcome> {
        if !path.is_file() {
            anyhow::bail!("Not a file: {}", path.display());
        }
        match SourceFormat::from_path(path) {
            Some(SourceFormat::Video(_)) => self.convert_file(path, ConversionKind::Video),
            _ => anyhow::bail!("Unsupported video format: {}", path.display()),
        }
    }

    /// Re-encode every `source` video in `dir` to H.265
    pub fn convert_video_in_dir_to_h265<F>(
        &self,
        dir: &Path,
        source: VideoSource,
        on_file: F,
    ) -> Result<Vec<FileReport>>
    where
        F: Fn(&FileReport) + Sync,
    {
        self.convert_dir(dir, SourceFormat::Video(source), ConversionKind::Video, on_file)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Writes a marker file instead of encoding; fails on names containing "corrupt"
    #[derive(Default)]
    pub struct RecordingEncoder {
        pub calls: Mutex<Vec<(PathBuf, PathBuf, ConversionKind)>>,
    }

    impl RecordingEncoder {
        pub fn calls(&self) -> Vec<(PathBuf, PathBuf, ConversionKind)> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort_by(|a, b| a.0.cmp(&b.0));
            calls
        }

        fn record(&self, input: &Path, output: &Path, kind: ConversionKind) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), output.to_path_buf(), kind));
            // Partial output to check cleanup
            fs::write(output, b"encoded")?;
            if input.to_string_lossy().contains("corrupt") {
                anyhow::bail!("decoder error in {}", input.display());
            }
            Ok(())
        }
    }

    impl Encoder for RecordingEncoder {
        fn encode_image(&self, input: &Path, output: &Path, target: ImageTarget) -> Result<()> {
            self.record(input, output, ConversionKind::Image(target))
        }

        fn encode_video(&self, input: &Path, output: &Path) -> Result<()> {
            self.record(input, output, ConversionKind::Video)
        }
    }

    pub fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"source").unwrap();
    }
}
