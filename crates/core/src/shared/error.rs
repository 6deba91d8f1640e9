use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by a watermarking run. All of them are fatal; none are
/// retried.
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("failed to open {}: {reason}", .path.display())]
    OpenFailure { path: PathBuf, reason: String },
    #[error("text rendering unavailable: {0}")]
    RenderUnavailable(String),
    #[error("failed to decode frame: {0}")]
    ReadFailure(String),
    #[error("failed to write frame: {0}")]
    WriteFailure(String),
    #[error("processing cancelled")]
    Cancelled,
}

impl WatermarkError {
    pub fn open_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OpenFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
