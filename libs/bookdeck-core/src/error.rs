//! Error types for bookdeck-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the core library.
///
/// Ranking and deduplication are total over valid cards; only name parsing
/// and checkpoint I/O can fail.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid keep strategy: {0} (expected first, highest_score or highest_importance)")]
    InvalidKeepStrategy(String),

    #[error("invalid density: {0} (expected light, medium or thorough)")]
    InvalidDensity(String),

    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint json error: {0}")]
    Json(#[from] serde_json::Error),
}
