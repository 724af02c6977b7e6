//! Git mirror errors.

use std::path::{Path, PathBuf};

use git2::{ErrorClass, ErrorCode};

use crate::retry::Transient;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {operation} failed for {remote}: {source}")]
    Git {
        operation: &'static str,
        remote: String,
        #[source]
        source: git2::Error,
    },

    #[error("git {operation} of {remote} timed out")]
    Timeout { operation: &'static str, remote: String },

    #[error("{path} is not a git repository")]
    NotARepository { path: PathBuf },

    #[error("store tracks {found}")]
    RemoteMismatch { found: String },

    #[error("local branch {branch} has diverged from the remote")]
    Diverged { branch: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git task failed: {0}")]
    Task(String),
}

impl GitError {
    pub fn git(operation: &'static str, remote: &str, source: git2::Error) -> Self {
        GitError::Git { operation, remote: remote.to_string(), source }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GitError::Io { path: path.into(), source }
    }

    /// Map onto the store-level failure classes.
    ///
    /// A store that is not a mirror of `remote`, or cannot be fast-forwarded
    /// to it, is a mismatch; everything else is a retrieval failure.
    pub fn into_store_error(self, store: &Path, remote: &str) -> docsync_core::Error {
        let mismatch = |found: String| docsync_core::Error::StoreMismatch {
            path: store.to_path_buf(),
            expected: remote.to_string(),
            found,
        };
        match self {
            GitError::NotARepository { .. } => mismatch("no git repository".to_string()),
            GitError::RemoteMismatch { found } => mismatch(found),
            GitError::Diverged { branch } => mismatch(format!("a {branch} history that diverged from the remote")),
            other => docsync_core::Error::Retrieval(other.to_string()),
        }
    }
}

impl Transient for GitError {
    /// Timeouts, network and OS-level transport failures are retried;
    /// authentication and missing repositories are not.
    fn is_transient(&self) -> bool {
        match self {
            GitError::Timeout { .. } => true,
            GitError::Git { source, .. } => {
                !matches!(source.code(), ErrorCode::Auth | ErrorCode::NotFound | ErrorCode::Certificate)
                    && matches!(source.class(), ErrorClass::Net | ErrorClass::Os | ErrorClass::Http | ErrorClass::Ssl)
            }
            _ => false,
        }
    }
}

impl From<GitError> for docsync_core::Error {
    fn from(err: GitError) -> Self {
        docsync_core::Error::Retrieval(err.to_string())
    }
}
