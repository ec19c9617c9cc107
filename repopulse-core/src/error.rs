//! Error types for repopulse-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the repopulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The persisted history could not be parsed as a sequence of snapshots.
    ///
    /// Recoverable: callers substitute an empty history.
    #[error("corrupt history at {path:?}: {message}")]
    CorruptHistory { path: PathBuf, message: String },

    /// Not enough data points in the window to fit a trend.
    #[error("no trend data for {metric}: {points} point(s) across {days} day(s) in window")]
    NoData {
        metric: String,
        points: usize,
        days: usize,
    },

    /// Writing or renaming the history file failed.
    ///
    /// The previously committed file is left untouched.
    #[error("failed to persist history to {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bounded file operation exceeded its ceiling.
    ///
    /// The worker is abandoned, not cancelled. A timed-out persist may still
    /// rename its staged file into place afterwards, or leave the staged file
    /// behind if the process exits first; the next persist removes it.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Output captured from an external tool could not be interpreted
    #[error("unreadable {tool} output: {message}")]
    ToolOutput { tool: String, message: String },

    /// A snapshot supplied by the caller is malformed
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl Error {
    pub fn tool_output(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolOutput {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for repopulse-core
pub type Result<T> = std::result::Result<T, Error>;
