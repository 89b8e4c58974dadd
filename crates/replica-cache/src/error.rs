//! Error types for cache operations.

use replica_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur in cache collections and lifetime objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A mutating operation was attempted on a deleted object.
    #[error("object has been deleted: {name}")]
    ObjectDeleted { name: String },

    /// An object with this name is already in the collection.
    #[error("duplicate object name: {name}")]
    DuplicateName { name: String },

    /// No object with this name is in the collection.
    #[error("object not found: {name}")]
    NotFound { name: String },
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ObjectDeleted { .. } => ErrorKind::State,
            Self::DuplicateName { .. } => ErrorKind::DomainConflict,
            Self::NotFound { .. } => ErrorKind::Argument,
        }
    }
}

/// Convenience type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
