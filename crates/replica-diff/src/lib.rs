//! Snapshots of reference positions and the diff between two snapshots.
//!
//! A remote operation is summarized by capturing a [`RefsState`] before and
//! after it and feeding both to [`RefsDiff::calculate`].
//!
//! # Key Types
//!
//! - [`RefsState`] -- Ordered (kind, full name) -> hash snapshot
//! - [`RefsDiff`] / [`ReferenceChange`] / [`ChangeType`] -- Added, moved and removed references

pub mod diff;
pub mod state;

pub use diff::{ChangeType, ReferenceChange, RefsDiff};
pub use state::{RefsState, RefsStateEntry};
