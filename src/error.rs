//! Error types for heatmap loading.
//!
//! Per-record problems (missing ids, bad geometry, non-finite values) are not
//! errors: those records are dropped and counted during ingestion.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for heatmap operations.
pub type Result<T> = std::result::Result<T, HeatmapError>;

/// Errors that can occur while configuring or loading a heatmap.
#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Configuration validation failed
    #[error("configuration error: {0}")]
    Config(String),

    /// A reference boundary could not be used for grid coverage
    #[error("invalid geometry: {0}")]
    Geometry(String),

    /// Backend answered with a non-success status
    #[error("HTTP {0}")]
    Status(u16),

    /// Network or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not the expected JSON
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Fetch did not resolve within the caller's timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request was superseded by a newer viewport state
    #[error("request cancelled")]
    Cancelled,

    /// Another caller's in-flight fetch for the same key failed
    #[error("shared fetch failed: {0}")]
    SharedFetch(String),

    /// IO error (config and record files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking build task panicked or was aborted
    #[error("background task failed: {0}")]
    Task(String),
}

impl HeatmapError {
    /// Supersession is not a failure and must not be shown to the user.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, HeatmapError::Cancelled)
    }

    /// Whether this failure came from the fetch path (as opposed to local setup).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            HeatmapError::Status(_)
                | HeatmapError::Transport(_)
                | HeatmapError::Parse(_)
                | HeatmapError::Timeout(_)
                | HeatmapError::SharedFetch(_)
        )
    }
}
