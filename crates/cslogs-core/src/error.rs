//! Error types for cslogs

use std::path::PathBuf;

/// cslogs error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid stream type: {0}")]
    InvalidStreamKind(String),

    #[error("Invalid path segment: {0:?}")]
    InvalidSegment(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for cslogs
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }
}
