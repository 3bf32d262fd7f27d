//! Error types for Waylon

use thiserror::Error;

/// Result type alias for Waylon operations
pub type Result<T> = std::result::Result<T, WaylonError>;

/// Main error type for Waylon
#[derive(Error, Debug)]
pub enum WaylonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid work '{work_id}': {reason}")]
    InvalidWork { work_id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WaylonError {
    pub fn invalid_work(work_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWork {
            work_id: work_id.into(),
            reason: reason.into(),
        }
    }
}
