//! Error types for the knowledge base

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the retrieval layer.
///
/// Most failure modes (malformed corpus files, unreadable cache, missing
/// embedding model) are logged and degraded internally. Only invalid
/// arguments reach callers of `search`.
#[derive(Debug, Error)]
pub enum KbError {
    /// Caller passed an argument outside its valid range.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Corpus file could not be decoded.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("embedding cache error: {0}")]
    Cache(String),

    #[error("embedding provider error: {0}")]
    Embedding(String),
}

impl KbError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for KbError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
