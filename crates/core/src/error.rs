//! Unified error types for docsync.
//!
//! Every variant belongs to one of the failure classes the CLI reports
//! through its exit code, see [`Error::exit_code`].

use std::path::PathBuf;

use crate::config::ConfigError;

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for store and synchronizer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network, transport or remote-content failure.
    ///
    /// Recoverable by retrying the whole operation later.
    #[error("RETRIEVAL_FAILED: {0}")]
    Retrieval(String),

    /// A retriever produced an entry whose path cannot live beneath a store root.
    #[error("INVALID_ENTRY: {path:?} ({reason})")]
    InvalidEntry { path: String, reason: String },

    /// Local filesystem failure.
    #[error("STORE_IO: {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The advisory lock call on the store lock file failed.
    ///
    /// Acquiring the lock blocks while another process holds it, so this is a
    /// system error, not contention.
    #[error("STORE_IO: failed to lock {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store was produced from a different remote than the one requested.
    #[error("STORE_MISMATCH: {path} mirrors {found}, expected {expected} (use --force to replace it)")]
    StoreMismatch { path: PathBuf, expected: String, found: String },

    /// Manifest could not be encoded or decoded.
    #[error("STORE_IO: corrupt manifest at {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Invalid configuration.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreIo { path: path.into(), source }
    }

    pub fn invalid_entry(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntry { path: path.into(), reason: reason.into() }
    }

    /// Process exit code for this failure class.
    ///
    /// - `1` retrieval failure
    /// - `2` store I/O failure
    /// - `3` remote-identity mismatch
    /// - `4` configuration failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Retrieval(_) | Error::InvalidEntry { .. } => 1,
            Error::StoreIo { .. } | Error::LockFailed { .. } | Error::Manifest { .. } => 2,
            Error::StoreMismatch { .. } => 3,
            Error::Config(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Retrieval("status 404".to_string());
        assert!(err.to_string().contains("RETRIEVAL_FAILED"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Retrieval("x".into()).exit_code(), 1);
        assert_eq!(Error::invalid_entry("../x", "escapes root").exit_code(), 1);
        assert_eq!(Error::io("/tmp/doccache", std::io::Error::other("denied")).exit_code(), 2);
        let mismatch = Error::StoreMismatch {
            path: "/tmp/doccache".into(),
            expected: "https://a.example/".into(),
            found: "https://b.example/".into(),
        };
        assert_eq!(mismatch.exit_code(), 3);
        let config = Error::Config(ConfigError::UnknownSource("nope".into()));
        assert_eq!(config.exit_code(), 4);
    }

    #[test]
    fn test_mismatch_names_store_path() {
        let err = Error::StoreMismatch {
            path: "/tmp/doccache".into(),
            expected: "https://a.example/".into(),
            found: "https://b.example/".into(),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/doccache"));
        assert!(message.contains("--force"));
    }
}
