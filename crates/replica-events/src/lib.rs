//! Event plumbing for replica.
//!
//! Cache objects expose their events as [`EventChannel`]s: broadcast
//! senders that never block and never call back into subscriber code, so a
//! collection can emit while it still holds its own state consistent.
//!
//! [`NotificationGate`] sits between an external change watcher and the
//! repository. It forwards change notifications as [`RefreshRequest`]s,
//! except for categories a local operation has suppressed for the duration
//! of a [`SuppressionGuard`].

pub mod categories;
pub mod channel;
pub mod gate;

pub use categories::ChangeCategories;
pub use channel::{EventChannel, EventStream, DEFAULT_CAPACITY};
pub use gate::{NotificationGate, RefreshRequest, SuppressionGuard};
