//! Revision cache for replica.
//!
//! A [`Revision`] is the single in-memory instance of a commit for a
//! repository session. [`RevisionCache`] is the identity map that hands out
//! those instances: requesting the same hash twice yields the same `Arc`.
//! Revisions first seen only by hash (as a parent or a reference target)
//! are stubs and are filled in from the external repository on demand.
//!
//! Which references currently point at a revision is tracked outside the
//! revision itself, in [`ReferenceLinks`], so neither side owns the other.

pub mod cache;
pub mod error;
pub mod links;
pub mod revision;

pub use cache::RevisionCache;
pub use error::{RevisionError, Result};
pub use links::ReferenceLinks;
pub use revision::Revision;
