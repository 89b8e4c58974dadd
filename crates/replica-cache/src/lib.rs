//! Identity-stable caching for replica.
//!
//! Every cached domain object carries a [`Lifetime`]: it starts alive, can be
//! marked deleted when the external repository stops reporting it, and can
//! be revived if it reappears under the same name. The instance is never
//! replaced, so anything holding an `Arc` to it keeps a valid identity.
//!
//! [`ObjectCollection`] is the name-keyed container for such objects. Its
//! [`merge`](ObjectCollection::merge) reconciles a freshly queried record
//! list against the cached objects under a single write lock.
//!
//! # Key Types
//!
//! - [`Lifetime`] — Alive / Deleted / Revived state with transition events
//! - [`CacheObject`] — Capability trait for anything stored in a collection
//! - [`ObjectCollection`] — Name-keyed collection with merge-refresh
//! - [`CacheError`] — Errors from collection and lifetime operations

pub mod collection;
pub mod error;
pub mod lifetime;

pub use collection::{CollectionChange, MergeSummary, ObjectCollection};
pub use error::{CacheError, Result};
pub use lifetime::{CacheObject, Lifetime, LifetimeEvent, LifetimeState, Renamable};
