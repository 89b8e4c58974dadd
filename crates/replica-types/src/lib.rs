//! Foundation types for replica.
//!
//! This crate provides the identity and naming types shared by every other
//! replica crate: the content hash that identifies a commit, the reference
//! kinds and their full-name prefixes, and author/committer signatures.
//!
//! # Key Types
//!
//! - [`Hash`] — Strongly-typed 20-byte commit hash
//! - [`ReferenceType`] — Kind of a named reference (branch, remote branch, tag, ...)
//! - [`ReferenceTypes`] — Bitmask selecting a subset of reference kinds
//! - [`ReferenceKey`] — `(kind, full name)` pair identifying a reference
//! - [`Signature`] / [`User`] — Identity plus timestamp of an author or committer
//! - [`ErrorKind`] — Error taxonomy shared by every layer's error type

pub mod error;
pub mod hash;
pub mod reference;
pub mod signature;

pub use error::{ErrorKind, TypeError};
pub use hash::Hash;
pub use reference::{split_remote_branch_name, ReferenceKey, ReferenceType, ReferenceTypes};
pub use signature::{Signature, User};
