//! Error types for hnsift.
//!
//! Library crates use [`HnSiftError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all hnsift operations.
#[derive(Debug, thiserror::Error)]
pub enum HnSiftError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the feed, the reader proxy or the classifier.
    #[error("network error: {0}")]
    Network(String),

    /// JSON or response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Persisted state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Classification call or answer error.
    #[error("classification error: {0}")]
    Classification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HnSiftError>;

impl HnSiftError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HnSiftError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = HnSiftError::Storage("articles.json is not valid JSON".into());
        assert!(err.to_string().starts_with("storage error:"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = HnSiftError::io(
            "/tmp/data/articles.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("articles.json"));
        assert!(msg.contains("denied"));
    }
}
