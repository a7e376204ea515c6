use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::utils::{has_valid_extension, is_tool_available};

/// Which external program writes HEIC files on this machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeicTool {
    /// `heif-enc` from libheif
    HeifEnc,
    /// ImageMagick v7
    Magick,
    /// ImageMagick v6
    Convert,
}

impl HeicTool {
    /// Probe the PATH, preferring libheif over ImageMagick
    pub fn detect() -> Option<HeicTool> {
        if is_tool_available("heif-enc", "--version") {
            Some(HeicTool::HeifEnc)
        } else if is_tool_available("magick", "-version") {
            Some(HeicTool::Magick)
        } else if is_tool_available("convert", "-version") {
            Some(HeicTool::Convert)
        } else {
            None
        }
    }

    fn program(self) -> &'static str {
        match self {
            HeicTool::HeifEnc => "heif-enc",
            HeicTool::Magick => "magick",
            HeicTool::Convert => "convert",
        }
    }
}

/// heif-enc only reads JPEG, PNG and Y4M
fn heif_enc_reads(path: &Path) -> bool {
    has_valid_extension(path, &["jpg", "jpeg", "png"])
}

fn intermediate_png_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp.png");
    output.with_file_name(name)
}

fn run_tool(tool: HeicTool, args: &[OsString]) -> Result<()> {
    let output = Command::new(tool.program())
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {}", tool.program()))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed: {}", tool.program(), stderr.trim());
    }
}

/// Quality as passed on the command line, 1 to 100
fn quality_arg(quality: f32) -> String {
    format!("{}", quality.round().clamp(1.0, 100.0) as u32)
}

/// Command line for `tool` reading `input` and writing `output`
pub fn heic_args(tool: HeicTool, input: &Path, output: &Path, quality: f32) -> Vec<OsString> {
    let quality = OsString::from(quality_arg(quality));

    match tool {
        HeicTool::HeifEnc => vec![
            "-q".into(),
            quality,
            "-o".into(),
            output.as_os_str().to_os_string(),
            input.as_os_str().to_os_string(),
        ],
        HeicTool::Magick | HeicTool::Convert => vec![
            input.as_os_str().to_os_string(),
            "-quality".into(),
            quality,
            output.as_os_str().to_os_string(),
        ],
    }
}

/// Run `encode` on a file heif-enc can read
///
/// JPEG and PNG are passed through; anything else (TIFF) is decoded and
/// written to a temporary PNG next to `output`, removed afterwards.
fn with_heif_enc_input<F>(input: &Path, output: &Path, encode: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if heif_enc_reads(input) {
        return encode(input);
    }

    let png = intermediate_png_path(output);
    image::open(input)
        .with_context(|| format!("Failed to open image: {}", input.display()))?
        .save(&png)
        .with_context(|| format!("Failed to write {}", png.display()))?;

    let result = encode(&png);
    let _ = fs::remove_file(&png);
    result
}

/// Write `input` to `output` as HEIC using `tool`
pub fn encode_heic(tool: HeicTool, input: &Path, output: &Path, quality: f32) -> Result<()> {
    match tool {
        HeicTool::HeifEnc => with_heif_enc_input(input, output, |source| {
            run_tool(tool, &heic_args(tool, source, output, quality))
        }),
        HeicTool::Magick | HeicTool::Convert => {
            run_tool(tool, &heic_args(tool, input, output, quality))
        }
    }
}
