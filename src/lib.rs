// Library exports for reuse by the CLI, the GUI and other applications
pub mod cli;
pub mod config_file;
pub mod convert;
pub mod dispatch;
pub mod formats;
pub mod json_output;
pub mod progress;
pub mod utils;

// Re-export commonly used types
pub use config_file::ConfigFile;
pub use convert::{
    ConversionConfig, ConversionEngine, ConversionKind, ConversionOutcome, ConversionStatus,
    Encoder, FileReport, ToolchainEncoder,
};
pub use dispatch::{
    plan_batch, run_batch, BatchPlan, BatchStep, BatchSummary, ExtensionSelection, FileStatus,
    ProgressEvent, TargetSelection,
};
pub use formats::{ImageSource, ImageTarget, SourceFormat, VideoSource};
pub use json_output::JsonMessage;
