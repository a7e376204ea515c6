use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::utils::is_tool_available;

pub fn is_ffmpeg_available() -> bool {
    is_tool_available("ffmpeg", "-version")
}

pub fn run_ffmpeg<S: AsRef<OsStr>>(args: &[S]) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .context("Failed to run ffmpeg")?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg failed: {}", stderr.trim());
    }
}

/// Arguments for an H.265 re-encode of the first video stream plus all audio
///
/// Audio goes to AAC because MKV/MOV sources may carry codecs that the MP4
/// muxer refuses. `hvc1` tagging keeps the result playable on Apple devices.
pub fn h265_args(input: &Path, output: &Path, crf: u8, preset: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_os_string());

    for arg in [
        "-map", "0:v:0", "-map", "0:a?", "-c:v", "libx265", "-crf",
    ] {
        args.push(arg.into());
    }
    args.push(crf.to_string().into());
    args.push("-preset".into());
    args.push(preset.into());
    for arg in ["-tag:v", "hvc1", "-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_os_string());
    args
}

pub fn encode_h265(input: &Path, output: &Path, crf: u8, preset: &str) -> Result<()> {
    run_ffmpeg(&h265_args(input, output, crf, preset))
        .with_context(|| format!("H.265 encoding failed: {}", input.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h265_args() {
        let args = h265_args(Path::new("in/clip.mkv"), Path::new("out/clip_h265.mp4"), 28, "slow");
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let position = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert_eq!(args[position("-i") + 1], "in/clip.mkv");
        assert_eq!(args[position("-c:v") + 1], "libx265");
        assert_eq!(args[position("-crf") + 1], "28");
        assert_eq!(args[position("-preset") + 1], "slow");
        assert_eq!(args[position("-tag:v") + 1], "hvc1");
        assert_eq!(args.last().unwrap(), "out/clip_h265.mp4");
        assert_eq!(args[0], "-y");
    }
}
