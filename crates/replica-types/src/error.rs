use std::fmt;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid hash length: expected {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("not a reference name: {0}")]
    InvalidReferenceName(String),
}

/// Classification of a failure, shared by the error types of every layer.
///
/// Callers branch on the kind rather than on concrete variants: argument and
/// domain-conflict errors are turned into user feedback, state errors mean
/// the object or repository cannot accept the operation right now, external
/// errors are infrastructure failures, and cancellation is cooperative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid name or missing pointer, detected before any external call.
    Argument,
    /// Operation on a deleted object, or incompatible with repository state.
    State,
    /// Named failure reported by the external tool (already exists, unknown
    /// revision, ...).
    DomainConflict,
    /// Generic failure of the external accessor.
    ExternalOperation,
    /// Cooperative cancellation.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Argument => "argument",
            Self::State => "state",
            Self::DomainConflict => "domain conflict",
            Self::ExternalOperation => "external operation",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
