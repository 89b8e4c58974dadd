//! Errors reported by the external accessor layer.

use replica_types::ErrorKind;
use thiserror::Error;

/// Failures reported by a [`RepositoryAccessor`](crate::RepositoryAccessor).
///
/// Named variants are domain conflicts the caller is expected to translate
/// into user feedback; [`AccessorError::Operation`] is a generic failure of
/// the external tool or its transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessorError {
    #[error("branch already exists: {name}")]
    BranchAlreadyExists { name: String },

    #[error("branch not found: {name}")]
    BranchNotFound { name: String },

    #[error("branch is not fully merged: {name}")]
    BranchNotFullyMerged { name: String },

    #[error("tag already exists: {name}")]
    TagAlreadyExists { name: String },

    #[error("tag not found: {name}")]
    TagNotFound { name: String },

    #[error("unknown revision: {revision}")]
    UnknownRevision { revision: String },

    #[error("remote not found: {name}")]
    RemoteNotFound { name: String },

    #[error("{operation} failed: {message}")]
    Operation { operation: String, message: String },
}

impl AccessorError {
    /// Create a generic operation failure.
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for named conflicts (as opposed to generic failures).
    pub fn is_domain_conflict(&self) -> bool {
        !matches!(self, Self::Operation { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_domain_conflict() {
            ErrorKind::DomainConflict
        } else {
            ErrorKind::ExternalOperation
        }
    }
}

/// Convenience alias for accessor results.
pub type Result<T> = std::result::Result<T, AccessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_failures_are_domain_conflicts() {
        let err = AccessorError::BranchAlreadyExists { name: "main".into() };
        assert!(err.is_domain_conflict());
        assert_eq!(err.kind(), ErrorKind::DomainConflict);
        assert_eq!(err.to_string(), "branch already exists: main");
    }

    #[test]
    fn generic_failure_is_external() {
        let err = AccessorError::operation("query_references", "exit status 128");
        assert!(!err.is_domain_conflict());
        assert_eq!(err.kind(), ErrorKind::ExternalOperation);
        assert_eq!(err.to_string(), "query_references failed: exit status 128");
    }
}
