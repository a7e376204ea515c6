use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::cli::Args;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    if args.input_paths.is_empty() {
        return Err(anyhow::anyhow!("No input paths specified"));
    }

    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    if args.targets().is_empty() {
        return Err(anyhow::anyhow!(
            "No output format selected. Use at least one of --avif, --heic, --h265"
        ));
    }

    args.parse_extensions().map_err(|e| anyhow::anyhow!(e))?;

    if !(1.0..=100.0).contains(&args.quality) {
        return Err(anyhow::anyhow!(
            "Quality must be between 1 and 100, got: {}",
            args.quality
        ));
    }

    if !(1..=10).contains(&args.speed) {
        return Err(anyhow::anyhow!(
            "Speed must be between 1 and 10, got: {}",
            args.speed
        ));
    }

    if args.crf > 51 {
        return Err(anyhow::anyhow!(
            "CRF must be between 0 and 51, got: {}",
            args.crf
        ));
    }

    if args.jobs > 64 {
        return Err(anyhow::anyhow!(
            "Job count too high (max 64), got: {}",
            args.jobs
        ));
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[&str]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext.as_str())
    } else {
        false
    }
}

/// Check whether an external program can be launched
///
/// `version_arg` is whatever makes the tool print its version and exit 0
/// (`-version` for ffmpeg/ImageMagick, `--version` for heif-enc).
pub fn is_tool_available(program: &str, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// File name for display, falling back to the full path
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}
