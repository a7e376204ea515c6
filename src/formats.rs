//! Source and target media formats.
//!
//! Each format has a stable numeric code (image sources jpg=0, tif=1, png=2;
//! targets AVIF=0, HEIC=1; videos mp4=0, mkv=1, mov=2) for library callers
//! that select formats by number. Config files and JSON output use extension
//! strings instead.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::utils::get_file_extension;

/// Still image formats that can be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    #[strum(serialize = ".jpg")]
    Jpeg,
    #[strum(serialize = ".tif")]
    Tiff,
    #[strum(serialize = ".png")]
    Png,
}

/// Still image formats that can be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTarget {
    #[strum(serialize = "AVIF")]
    Avif,
    #[strum(serialize = "HEIC")]
    Heic,
}

/// Video containers that can be re-encoded to H.265
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    #[strum(serialize = ".mp4")]
    Mp4,
    #[strum(serialize = ".mkv")]
    Mkv,
    #[strum(serialize = ".mov")]
    Mov,
}

/// Any source the dispatcher can route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Image(ImageSource),
    Video(VideoSource),
}

impl ImageSource {
    pub fn code(self) -> u8 {
        match self {
            ImageSource::Jpeg => 0,
            ImageSource::Tiff => 1,
            ImageSource::Png => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| anyhow::anyhow!("Unknown image source format code: {}", code))
    }

    /// Extensions recognised for this source, lowercase, without the dot
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageSource::Jpeg => &["jpg", "jpeg"],
            ImageSource::Tiff => &["tif", "tiff"],
            ImageSource::Png => &["png"],
        }
    }
}

impl ImageTarget {
    pub fn code(self) -> u8 {
        match self {
            ImageTarget::Avif => 0,
            ImageTarget::Heic => 1,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| anyhow::anyhow!("Unknown image target format code: {}", code))
    }

    /// Extension of the written file
    pub fn extension(self) -> &'static str {
        match self {
            ImageTarget::Avif => "avif",
            ImageTarget::Heic => "heic",
        }
    }
}

impl VideoSource {
    pub fn code(self) -> u8 {
        match self {
            VideoSource::Mp4 => 0,
            VideoSource::Mkv => 1,
            VideoSource::Mov => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| anyhow::anyhow!("Unknown video source format code: {}", code))
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            VideoSource::Mp4 => &["mp4"],
            VideoSource::Mkv => &["mkv"],
            VideoSource::Mov => &["mov"],
        }
    }
}

impl SourceFormat {
    /// Every supported source, images first
    pub fn all() -> Vec<SourceFormat> {
        ImageSource::iter()
            .map(SourceFormat::Image)
            .chain(VideoSource::iter().map(SourceFormat::Video))
            .collect()
    }

    /// Map a bare extension ("JPG", "tiff", ".mov") to its source format
    pub fn from_extension(ext: &str) -> Option<SourceFormat> {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        Self::all()
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    pub fn from_path(path: &Path) -> Option<SourceFormat> {
        get_file_extension(path).and_then(|ext| Self::from_extension(&ext))
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            SourceFormat::Image(source) => source.extensions(),
            SourceFormat::Video(source) => source.extensions(),
        }
    }

    pub fn matches(self, path: &Path) -> bool {
        Self::from_path(path) == Some(self)
    }

    /// Short label for checkboxes and messages, e.g. ".jpg"
    pub fn label(self) -> String {
        match self {
            SourceFormat::Image(source) => source.to_string(),
            SourceFormat::Video(source) => source.to_string(),
        }
    }
}
