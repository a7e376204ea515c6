use anyhow::Result;
use std::path::Path;

use super::avif::encode_avif;
use super::ffmpeg::{encode_h265, is_ffmpeg_available};
use super::heic::{encode_heic, HeicTool};
use super::ConversionConfig;
use crate::formats::ImageTarget;

/// The codec work behind a conversion
///
/// Implementations write exactly one file at `output` or fail; the engine
/// owns naming, skipping and cleanup.
pub trait Encoder: Send + Sync {
    fn encode_image(&self, input: &Path, output: &Path, target: ImageTarget) -> Result<()>;
    fn encode_video(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Default encoder: AVIF in-process, HEIC via libheif/ImageMagick, H.265 via ffmpeg
#[derive(Debug, Clone)]
pub struct ToolchainEncoder {
    avif_quality: f32,
    avif_speed: u8,
    h265_crf: u8,
    h265_preset: String,
    heic_tool: Option<HeicTool>,
    ffmpeg_available: bool,
}

impl ToolchainEncoder {
    /// Probes the PATH once for the external encoders
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            avif_quality: config.avif_quality,
            avif_speed: config.avif_speed,
            h265_crf: config.h265_crf,
            h265_preset: config.h265_preset.clone(),
            heic_tool: HeicTool::detect(),
            ffmpeg_available: is_ffmpeg_available(),
        }
    }

    pub fn heic_tool(&self) -> Option<HeicTool> {
        self.heic_tool
    }

    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg_available
    }
}

impl Encoder for ToolchainEncoder {
    fn encode_image(&self, input: &Path, output: &Path, target: ImageTarget) -> Result<()> {
        match target {
            ImageTarget::Avif => encode_avif(input, output, self.avif_quality, self.avif_speed),
            ImageTarget::Heic => {
                let tool = self.heic_tool.ok_or_else(|| {
                    anyhow::anyhow!(
                        "HEIC output needs heif-enc (libheif) or ImageMagick, neither was found in PATH"
                    )
                })?;
                encode_heic(tool, input, output, self.avif_quality)
            }
        }
    }

    fn encode_video(&self, input: &Path, output: &Path) -> Result<()> {
        if !self.ffmpeg_available {
            anyhow::bail!("H.265 output needs ffmpeg with libx265, ffmpeg was not found in PATH");
        }
        encode_h265(input, output, self.h265_crf, &self.h265_preset)
    }
}
