//! Error types for autoservice.
//!
//! Library crates use [`AutoserviceError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the HTTP layer maps it to status codes.

use std::path::PathBuf;

/// Top-level error type for all autoservice operations.
#[derive(Debug, thiserror::Error)]
pub enum AutoserviceError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The text-completion backend is missing a credential, unreachable,
    /// or returned nothing usable.
    #[error("completion unavailable: {0}")]
    CompletionUnavailable(String),

    /// No web-search credential is configured.
    #[error("web search unavailable")]
    SearchUnavailable,

    /// The web-search call itself failed.
    #[error("search failed: {0}")]
    SearchFailed(String),

    /// A requested record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty message, dangling reference, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AutoserviceError>;

impl AutoserviceError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a storage error from any displayable value.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Create a completion error from any displayable message.
    pub fn completion(msg: impl Into<String>) -> Self {
        Self::CompletionUnavailable(msg.into())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
