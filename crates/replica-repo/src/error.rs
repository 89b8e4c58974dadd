//! Error types for repository operations.

use replica_accessor::AccessorError;
use replica_cache::CacheError;
use replica_refs::RefError;
use replica_revisions::RevisionError;
use replica_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur while loading or operating on a [`Repository`](crate::Repository).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    /// The configuration could not be read or holds an invalid value.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The handle was disposed.
    #[error("repository has been disposed")]
    Disposed,

    #[error("{message}")]
    InvalidState { message: String },

    /// Loading was cancelled between two steps.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Accessor(#[from] AccessorError),

    /// A blocking task panicked or was aborted.
    #[error("background task failed: {message}")]
    Task { message: String },
}

impl RepoError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub(crate) fn task(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Argument,
            Self::Disposed | Self::InvalidState { .. } => ErrorKind::State,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Ref(err) => err.kind(),
            Self::Revision(err) => err.kind(),
            Self::Cache(err) => err.kind(),
            Self::Accessor(err) => err.kind(),
            Self::Task { .. } => ErrorKind::ExternalOperation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
