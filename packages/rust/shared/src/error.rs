//! Error types for DocBuilder.
//!
//! Library crates use [`DocBuilderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all DocBuilder operations.
#[derive(Debug, thiserror::Error)]
pub enum DocBuilderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Manifest, TOC or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Precondition failure (empty selection, unknown node, missing output path).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Another scan or build is still running.
    #[error("busy: {0}")]
    Busy(String),

    /// A background worker panicked or was cancelled.
    #[error("worker error: {0}")]
    Worker(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocBuilderError>;

impl DocBuilderError {
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
        let err = DocBuilderError::config("unknown section");
        assert_eq!(err.to_string(), "config error: unknown section");

        let err = DocBuilderError::validation("selection is empty");
        assert!(err.to_string().contains("selection is empty"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = DocBuilderError::io(
            "/tmp/missing.xml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("missing.xml"));
        assert!(msg.contains("gone"));
    }
}
