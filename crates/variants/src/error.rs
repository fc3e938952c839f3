use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, VariantError>;

/// Errors surfaced by the variant pipeline.
///
/// Per-job encode failures never show up here; the orchestrator logs them and
/// leaves the job's output out of the result set.
#[derive(Debug, Error)]
pub enum VariantError {
    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("The input doesn't contain any stream")]
    NoStreams,

    #[error("The input doesn't contain a video stream")]
    NoVideoStream,

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Output path is not a directory: {0}")]
    Directory(PathBuf),

    #[error("Artifact was not produced: {0}")]
    MissingArtifact(&'static str),

    #[error("None of the requested variants were produced")]
    NoVariantsProduced,

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VariantError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}

impl From<tokio::task::JoinError> for VariantError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
