use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Column not found: '{name}'. Available columns are: {}", available.join(", "))]
    MissingColumn { name: String, available: Vec<String> },

    #[error("Cannot forecast from an empty history")]
    EmptyHistory,

    #[error("Render error ({path}): {message}")]
    Render { path: PathBuf, message: String },

    #[error("Image not found: {0}")]
    MissingImage(PathBuf),

    #[error("Write error ({path}): {message}")]
    Write { path: PathBuf, message: String },
}

impl TrackerError {
    /// True for the one condition callers are expected to report and skip
    /// instead of aborting the run.
    pub fn is_missing_column(&self) -> bool {
        matches!(self, TrackerError::MissingColumn { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
