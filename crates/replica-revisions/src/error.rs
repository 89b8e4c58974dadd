//! Error types for revision cache operations.

use replica_accessor::AccessorError;
use replica_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error(transparent)]
    Accessor(#[from] AccessorError),

    /// A blocking task running the query panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task { message: String },
}

impl RevisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Accessor(err) => err.kind(),
            Self::Task { .. } => ErrorKind::ExternalOperation,
        }
    }
}

/// Convenience type alias for revision cache operations.
pub type Result<T> = std::result::Result<T, RevisionError>;
