use std::path::PathBuf;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Vision Error: {0}")]
    Vision(#[from] VisionError),
    #[error("Task Error: {0}")]
    Task(#[from] TaskError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("OpMode '{0}' failed: {1}")]
    OpMode(&'static str, String),
}

// Native vision library Error Type
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Failed to load vision library at {path}: {reason}")]
    Init { path: PathBuf, reason: String },
    #[error("Vision library is missing symbol '{0}': {1}")]
    MissingSymbol(&'static str, String),
    #[error("Analysis failed with status {0}")]
    AnalysisFailed(i32),
}

// Background analysis task Error Type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("The analysis task was cancelled.")]
    Cancelled,
    #[error("The analysis task failed: {0}")]
    Failed(String),
    #[error("The analysis worker is no longer running.")]
    WorkerGone,
}
