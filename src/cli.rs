use clap::Parser;
use std::path::PathBuf;

use crate::convert::ConversionConfig;
use crate::dispatch::{ExtensionSelection, TargetSelection};
use crate::formats::SourceFormat;

pub const DEFAULT_EXTENSIONS: &str = "jpg,png,tif,mp4,mkv,mov";
pub const DEFAULT_QUALITY: f32 = 80.0;
pub const DEFAULT_SPEED: u8 = 6;
pub const DEFAULT_CRF: u8 = 28;
pub const DEFAULT_PRESET: &str = "medium";

#[derive(Parser, Debug)]
#[command(
    name = "heiya",
    about = "Batch convert images to AVIF/HEIC and videos to H.265",
    long_about = "
Heiya - batch media converter

Converts JPEG, PNG and TIFF images to AVIF or HEIC, and MP4, MKV and MOV
videos to H.265. Inputs can be single files or whole directories; for
directories, --ext chooses which kinds of files are picked up.

AVIF is encoded in-process. HEIC needs heif-enc (libheif) or ImageMagick,
H.265 needs ffmpeg built with libx265.

Example Usage:
  # Convert a single photo to AVIF (written next to the source)
  heiya -i ~/Photos/IMG_001.jpg --avif

  # Convert every JPEG and TIFF in a folder to both AVIF and HEIC
  heiya -i ~/Photos --ext jpg,tif --avif --heic

  # Re-encode all videos in a folder tree to H.265 into another directory
  heiya -i ~/Videos --ext mp4,mkv,mov --h265 --recursive -o ~/Videos/h265

  # See what would be written without encoding anything
  heiya -i ~/Photos --avif --dry-run --verbose"
)]
pub struct Args {
    /// Input files or directories (can be specified multiple times)
    #[arg(
        short = 'i',
        long = "input",
        required = true,
        value_name = "DIR|FILE"
    )]
    pub input_paths: Vec<PathBuf>,

    /// Write outputs here instead of next to each source file
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Convert images to AVIF
    #[arg(long = "avif")]
    pub avif: bool,

    /// Convert images to HEIC
    #[arg(long = "heic")]
    pub heic: bool,

    /// Convert videos to H.265
    #[arg(long = "h265")]
    pub h265: bool,

    /// Comma-separated list of extensions picked up inside directories
    #[arg(long = "ext", default_value = DEFAULT_EXTENSIONS, value_name = "LIST")]
    pub extensions_str: String,

    /// Descend into subdirectories
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Overwrite outputs that already exist
    #[arg(long = "force")]
    pub force: bool,

    /// Show what would be converted without writing any file
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Number of files converted at once inside a directory (0 = CPU count)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// AVIF/HEIC quality (1-100)
    #[arg(long = "quality", default_value_t = DEFAULT_QUALITY, value_name = "Q")]
    pub quality: f32,

    /// AVIF encoder speed (1 = slowest/best, 10 = fastest)
    #[arg(long = "speed", default_value_t = DEFAULT_SPEED, value_name = "S")]
    pub speed: u8,

    /// H.265 constant rate factor (0-51, lower is better)
    #[arg(long = "crf", default_value_t = DEFAULT_CRF, value_name = "N")]
    pub crf: u8,

    /// x265 preset (ultrafast ... placebo)
    #[arg(long = "preset", default_value = DEFAULT_PRESET, value_name = "PRESET")]
    pub preset: String,

    /// Emit progress as JSON lines on stdout instead of progress bars
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Load options from a JSON config file (command-line flags take precedence)
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Parse the extension list into source formats, dropping duplicates
    pub fn parse_extensions(&self) -> Result<Vec<SourceFormat>, String> {
        let mut formats = Vec::new();

        for ext in self.extensions_str.split(',') {
            let ext = ext.trim();
            if ext.is_empty() {
                continue;
            }

            match SourceFormat::from_extension(ext) {
                Some(format) => {
                    if !formats.contains(&format) {
                        formats.push(format);
                    }
                }
                None => {
                    return Err(format!(
                        "Unsupported extension '{}'. Valid extensions: jpg, png, tif, mp4, mkv, mov",
                        ext
                    ))
                }
            }
        }

        if formats.is_empty() {
            return Err("No valid extensions specified".to_string());
        }

        Ok(formats)
    }

    pub fn targets(&self) -> TargetSelection {
        TargetSelection {
            avif: self.avif,
            heic: self.heic,
            h265: self.h265,
        }
    }

    pub fn extensions(&self) -> ExtensionSelection {
        ExtensionSelection::from_formats(self.parse_extensions().unwrap_or_default())
    }

    pub fn parallel_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    pub fn conversion_config(&self) -> ConversionConfig {
        ConversionConfig {
            output_dir: self.output_dir.clone(),
            force: self.force,
            dry_run: self.dry_run,
            recursive: self.recursive,
            parallel_jobs: self.parallel_jobs(),
            verbose: self.verbose && !self.json_progress,
            avif_quality: self.quality,
            avif_speed: self.speed,
            h265_crf: self.crf,
            h265_preset: self.preset.clone(),
        }
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: None,
            avif: false,
            heic: false,
            h265: false,
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            recursive: false,
            force: false,
            dry_run: false,
            jobs: 0,
            quality: DEFAULT_QUALITY,
            speed: DEFAULT_SPEED,
            crf: DEFAULT_CRF,
            preset: DEFAULT_PRESET.to_string(),
            json_progress: false,
            config_file: None,
            verbose: false,
        }
    }
}
