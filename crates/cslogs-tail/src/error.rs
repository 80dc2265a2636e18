//! Why a tailed stream ended

use std::fmt;

/// Failure that ends a tailed stream
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason a tailed stream reached end-of-stream.
///
/// Consumers only ever observe end-of-stream; this value is kept for logging.
#[derive(Debug)]
pub enum TailEnd {
    /// The file was deleted or moved away
    SourceRemoved,
    /// The receiving side was dropped
    ConsumerClosed,
    Failed(TailError),
}

impl TailEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, TailEnd::Failed(_))
    }
}

impl fmt::Display for TailEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailEnd::SourceRemoved => f.write_str("file was deleted or moved"),
            TailEnd::ConsumerClosed => f.write_str("consumer closed"),
            TailEnd::Failed(e) => write!(f, "{}", e),
        }
    }
}
