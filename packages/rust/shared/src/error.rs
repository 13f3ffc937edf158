//! Error types for MediaImport.
//!
//! Library crates use [`MediaImportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all MediaImport operations.
#[derive(Debug, thiserror::Error)]
pub enum MediaImportError {
    /// Configuration loading or validation error (including a CSV without `src`).
    #[error("config error: {message}")]
    Config { message: String },

    /// A required input file is missing or unreadable.
    #[error("not found: {path:?}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    /// Network/HTTP error during download.
    #[error("network error: {0}")]
    Network(String),

    /// A CSV record could not be decoded.
    #[error("csv error at line {line}: {message}")]
    Csv { line: u64, message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, empty value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MediaImportError>;

impl MediaImportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-found error for `path`.
    pub fn not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a whole import job rather than a single row.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::NotFound { .. })
    }
}
