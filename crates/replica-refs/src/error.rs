//! Error types for reference operations.

use replica_accessor::AccessorError;
use replica_cache::CacheError;
use replica_revisions::RevisionError;
use replica_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// The name failed local validation. No external call was made.
    #[error("invalid reference name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// An argument other than a name was rejected before any external call.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The operation does not fit the current repository state.
    #[error("{message}")]
    InvalidState { message: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    Accessor(#[from] AccessorError),

    /// A blocking task running the refresh panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task { message: String },
}

impl RefError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. } | Self::InvalidArgument { .. } => ErrorKind::Argument,
            Self::InvalidState { .. } => ErrorKind::State,
            Self::Cache(err) => err.kind(),
            Self::Revision(err) => err.kind(),
            Self::Accessor(err) => err.kind(),
            Self::Task { .. } => ErrorKind::ExternalOperation,
        }
    }
}

/// Convenience type alias for reference operations.
pub type Result<T> = std::result::Result<T, RefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(RefError::invalid_name("a b", "space").kind(), ErrorKind::Argument);
        assert_eq!(RefError::invalid_state("empty").kind(), ErrorKind::State);
        assert_eq!(
            RefError::from(CacheError::ObjectDeleted { name: "dev".into() }).kind(),
            ErrorKind::State
        );
        assert_eq!(
            RefError::from(AccessorError::TagAlreadyExists { name: "v1".into() }).kind(),
            ErrorKind::DomainConflict
        );
        assert_eq!(
            RefError::from(AccessorError::operation("fetch", "network")).kind(),
            ErrorKind::ExternalOperation
        );
    }
}
