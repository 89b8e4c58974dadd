//! Tri-state lifetime shared by every cached object.

use std::sync::atomic::{AtomicU8, Ordering};

use replica_events::{EventChannel, EventStream};

use crate::error::{CacheError, Result};

const ALIVE: u8 = 0;
const DELETED: u8 = 1;
const REVIVED: u8 = 2;

/// Lifetime state of a cached object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifetimeState {
    Alive,
    Deleted,
    /// Alive again after having been deleted.
    Revived,
}

/// Transition notification fired by a [`Lifetime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifetimeEvent {
    Deleted,
    Revived,
}

/// Lifetime of one cached object.
///
/// Transitions are idempotent: marking an already deleted object deleted (or
/// reviving an object that is alive) does nothing and fires nothing.
#[derive(Debug)]
pub struct Lifetime {
    state: AtomicU8,
    events: EventChannel<LifetimeEvent>,
}

impl Lifetime {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ALIVE),
            events: EventChannel::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: AtomicU8::new(ALIVE),
            events: EventChannel::with_capacity(capacity),
        }
    }

    pub fn state(&self) -> LifetimeState {
        match self.state.load(Ordering::Acquire) {
            DELETED => LifetimeState::Deleted,
            REVIVED => LifetimeState::Revived,
            _ => LifetimeState::Alive,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state.load(Ordering::Acquire) == DELETED
    }

    /// Transition to `Deleted`. Returns `true` if this call made the
    /// transition (and fired [`LifetimeEvent::Deleted`]).
    pub fn mark_as_deleted(&self) -> bool {
        let changed = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s != DELETED).then_some(DELETED)
            })
            .is_ok();
        if changed {
            self.events.emit(LifetimeEvent::Deleted);
        }
        changed
    }

    /// Transition from `Deleted` to `Revived`. Returns `true` if this call
    /// made the transition (and fired [`LifetimeEvent::Revived`]).
    pub fn revive(&self) -> bool {
        let changed = self
            .state
            .compare_exchange(DELETED, REVIVED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            self.events.emit(LifetimeEvent::Revived);
        }
        changed
    }

    /// Fail with [`CacheError::ObjectDeleted`] if deleted.
    pub fn ensure_alive(&self, name: &str) -> Result<()> {
        if self.is_deleted() {
            Err(CacheError::ObjectDeleted {
                name: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub fn subscribe(&self) -> EventStream<LifetimeEvent> {
        self.events.subscribe()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

/// A named object with a [`Lifetime`], storable in an
/// [`ObjectCollection`](crate::ObjectCollection).
///
/// Implementors can hook into transitions through [`on_deleted`] and
/// [`on_revived`], which run only when the transition actually happens.
///
/// [`on_deleted`]: CacheObject::on_deleted
/// [`on_revived`]: CacheObject::on_revived
pub trait CacheObject: Send + Sync + 'static {
    /// Current name (the collection key).
    fn name(&self) -> String;

    fn lifetime(&self) -> &Lifetime;

    fn on_deleted(&self) {}

    fn on_revived(&self) {}

    fn is_deleted(&self) -> bool {
        self.lifetime().is_deleted()
    }

    fn mark_as_deleted(&self) -> bool {
        let changed = self.lifetime().mark_as_deleted();
        if changed {
            self.on_deleted();
        }
        changed
    }

    fn revive(&self) -> bool {
        let changed = self.lifetime().revive();
        if changed {
            self.on_revived();
        }
        changed
    }
}

/// A [`CacheObject`] whose name can change while it stays the same object.
pub trait Renamable: CacheObject {
    fn set_name(&self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn starts_alive() {
        let lifetime = Lifetime::new();
        assert_eq!(lifetime.state(), LifetimeState::Alive);
        assert!(lifetime.ensure_alive("x").is_ok());
    }

    #[test]
    fn delete_is_idempotent_and_fires_once() {
        let lifetime = Lifetime::new();
        let mut rx = lifetime.subscribe();
        assert!(lifetime.mark_as_deleted());
        assert!(!lifetime.mark_as_deleted());
        assert_eq!(rx.try_recv().unwrap(), LifetimeEvent::Deleted);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(
            lifetime.ensure_alive("dev"),
            Err(CacheError::ObjectDeleted { name: "dev".into() })
        );
    }

    #[test]
    fn revive_only_from_deleted() {
        let lifetime = Lifetime::new();
        let mut rx = lifetime.subscribe();
        assert!(!lifetime.revive());
        lifetime.mark_as_deleted();
        assert!(lifetime.revive());
        assert!(!lifetime.revive());
        assert_eq!(lifetime.state(), LifetimeState::Revived);
        assert!(!lifetime.is_deleted());
        assert_eq!(rx.try_recv().unwrap(), LifetimeEvent::Deleted);
        assert_eq!(rx.try_recv().unwrap(), LifetimeEvent::Revived);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn revived_object_can_be_deleted_again() {
        let lifetime = Lifetime::new();
        lifetime.mark_as_deleted();
        lifetime.revive();
        assert!(lifetime.mark_as_deleted());
        assert!(lifetime.is_deleted());
    }

    struct Tracked {
        lifetime: Lifetime,
        hooks: AtomicUsize,
    }

    impl CacheObject for Tracked {
        fn name(&self) -> String {
            "tracked".into()
        }

        fn lifetime(&self) -> &Lifetime {
            &self.lifetime
        }

        fn on_deleted(&self) {
            self.hooks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_revived(&self) {
            self.hooks.fetch_add(10, Ordering::SeqCst);
        }
    }

    #[test]
    fn hooks_run_only_on_transitions() {
        let tracked = Tracked {
            lifetime: Lifetime::new(),
            hooks: AtomicUsize::new(0),
        };
        tracked.mark_as_deleted();
        tracked.mark_as_deleted();
        tracked.revive();
        tracked.revive();
        assert_eq!(tracked.hooks.load(Ordering::SeqCst), 11);
    }
}
