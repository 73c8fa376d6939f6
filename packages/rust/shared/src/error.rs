//! Error types for PageNotFound.
//!
//! Library crates use [`PageNotFoundError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The finder itself never returns these: every failure on the request path is
//! logged and degraded to a plain 404.

use std::path::PathBuf;

/// Top-level error type for all PageNotFound operations.
#[derive(Debug, thiserror::Error)]
pub enum PageNotFoundError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A host collaborator (section registry, route service) failed.
    #[error("host service error: {0}")]
    Host(String),

    /// Snapshot or identifier parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (duplicate ids, dangling parents, cycles, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PageNotFoundError>;

impl PageNotFoundError {
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
        let err = PageNotFoundError::config("missing database path");
        assert_eq!(err.to_string(), "config error: missing database path");

        let err = PageNotFoundError::validation("node 12 lists unknown parent 40");
        assert!(err.to_string().contains("unknown parent 40"));

        let err = PageNotFoundError::Host("domain registry offline".into());
        assert_eq!(err.to_string(), "host service error: domain registry offline");
    }

    #[test]
    fn io_error_keeps_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PageNotFoundError::io("/tmp/site.toml", source);
        assert!(err.to_string().contains("/tmp/site.toml"));
    }
}
