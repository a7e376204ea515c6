//! JSON output for front-end integration
//!
//! When --json-progress is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dispatch::{BatchSummary, FileStatus, ProgressEvent};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

const PROGRESS_INTERVAL_MS: u64 = 40;

/// Whether a progress update at `now_ms` gets through the throttle
///
/// The final update (current == total) always passes.
fn should_emit_progress(last_ms: &AtomicU64, now_ms: u64, current: usize, total: usize) -> bool {
    let last = last_ms.load(Ordering::Relaxed);
    if now_ms.saturating_sub(last) >= PROGRESS_INTERVAL_MS || current == total {
        last_ms.store(now_ms, Ordering::Relaxed);
        true
    } else {
        false
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// File converted, skipped or simulated
    FileCompleted {
        input_path: String,
        output_path: String,
        status: String,
    },
    /// File conversion failed
    FileFailed { input_path: String, error: String },
    /// Batch summary
    Summary {
        total_files: usize,
        converted: usize,
        skipped: usize,
        /// Files a dry run would have converted
        dry_run: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// The final progress (current == total) is always emitted to ensure 100% completion.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        if should_emit_progress(&LAST_PROGRESS_MS, now_ms, current, total) {
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    /// Message describing one finished file
    pub fn for_file(input: &Path, status: &FileStatus) -> Self {
        let input_path = input.display().to_string();
        let completed = |output: &Path, status: &str| Self::FileCompleted {
            input_path: input_path.clone(),
            output_path: output.display().to_string(),
            status: status.to_string(),
        };

        match status {
            FileStatus::Converted(output) => completed(output, "converted"),
            FileStatus::Skipped(output) => completed(output, "skipped"),
            FileStatus::DryRun(output) => completed(output, "dry_run"),
            FileStatus::Failed(error) => Self::FileFailed {
                input_path: input_path.clone(),
                error: error.clone(),
            },
        }
    }

    pub fn summary(summary: &BatchSummary) -> Self {
        Self::Summary {
            total_files: summary.total,
            converted: summary.converted,
            skipped: summary.skipped,
            dry_run: summary.dry_run,
            failed: summary.failed.len(),
            duration_secs: summary.duration.as_secs_f64(),
        }
    }

    /// Print a batch event as JSON lines
    pub fn emit_event(event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => Self::progress(0, *total, "Starting"),
            ProgressEvent::FileDone {
                current,
                total,
                input,
                status,
                ..
            } => {
                Self::for_file(input, status).emit();
                Self::progress(*current, *total, input.display().to_string());
            }
            ProgressEvent::Finished(summary) => Self::summary(summary).emit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_for_file() {
        let msg = JsonMessage::for_file(
            Path::new("/p/a.jpg"),
            &FileStatus::Converted(PathBuf::from("/p/a.avif")),
        );
        assert_eq!(
            msg,
            JsonMessage::FileCompleted {
                input_path: "/p/a.jpg".to_string(),
                output_path: "/p/a.avif".to_string(),
                status: "converted".to_string(),
            }
        );

        let msg = JsonMessage::for_file(Path::new("/p/b.mkv"), &FileStatus::Failed("boom".into()));
        assert_eq!(
            msg,
            JsonMessage::FileFailed {
                input_path: "/p/b.mkv".to_string(),
                error: "boom".to_string(),
            }
        );
    }

    #[test]
    fn test_serialized_shape() {
        let summary = BatchSummary {
            total: 3,
            converted: 2,
            failed: vec![(PathBuf::from("x.jpg"), "bad".to_string())],
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(JsonMessage::summary(&summary)).unwrap();

        assert_eq!(json["type"], "summary");
        assert_eq!(json["total_files"], 3);
        assert_eq!(json["converted"], 2);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["dry_run"], 0);
        assert_eq!(json["duration_secs"], 1.5);

        let json = serde_json::to_value(JsonMessage::Progress {
            current: 1,
            total: 2,
            message: "a.jpg".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "progress");
    }

    #[test]
    fn test_dry_run_summary_counts_would_be_conversions() {
        let summary = BatchSummary {
            total: 4,
            dry_run: 3,
            skipped: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(JsonMessage::summary(&summary)).unwrap();
        assert_eq!(json["converted"], 0);
        assert_eq!(json["dry_run"], 3);
        assert_eq!(json["skipped"], 1);
    }

    #[test]
    fn test_progress_throttle() {
        let last = AtomicU64::new(0);

        assert!(should_emit_progress(&last, 1_000, 1, 10));
        // Within 40ms of the previous update
        assert!(!should_emit_progress(&last, 1_020, 2, 10));
        assert!(!should_emit_progress(&last, 1_039, 3, 10));
        assert_eq!(last.load(Ordering::Relaxed), 1_000);

        assert!(should_emit_progress(&last, 1_040, 4, 10));
        assert_eq!(last.load(Ordering::Relaxed), 1_040);
    }

    #[test]
    fn test_final_progress_always_emitted() {
        let last = AtomicU64::new(5_000);
        assert!(!should_emit_progress(&last, 5_001, 9, 10));
        assert!(should_emit_progress(&last, 5_002, 10, 10));
        // Empty batch start
        assert!(should_emit_progress(&last, 5_003, 0, 0));
    }
}
