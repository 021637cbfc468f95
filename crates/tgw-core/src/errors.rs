use std::{path::PathBuf, time::Duration};

/// Core error type for the wrapped pipeline.
///
/// Adapter crates map their specific failures into this type so the retry
/// wrapper can tell throttling apart from hard failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid export: {path}: {reason}")]
    InvalidExport { path: PathBuf, reason: String },

    #[error("oracle rate limited: {0}")]
    RateLimited(String),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("oracle retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Whether the classifier should back off and try the same call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited(_) | Error::Unavailable(_) | Error::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
