//! Scoped suppression of externally triggered refreshes.
//!
//! A local operation that changes, say, the branch list already refreshes
//! the cache itself. While it runs it holds a [`SuppressionGuard`] for
//! [`ChangeCategories::BRANCHES`], so the file-system watcher reporting the
//! same change does not trigger a second, redundant refresh. Notifications
//! that arrive while suppressed are remembered and released as a single
//! catch-up request when the last covering guard is dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::categories::ChangeCategories;
use crate::channel::{EventChannel, EventStream, DEFAULT_CAPACITY};

/// Request to refresh the cached data of some categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
    pub categories: ChangeCategories,
    /// `true` when released by a dropped suppression scope.
    pub catch_up: bool,
}

const CATEGORY_SLOTS: usize = 16;

#[derive(Debug, Default)]
struct GateState {
    monitoring: bool,
    /// Active suppression scopes, per category bit.
    counters: [usize; CATEGORY_SLOTS],
    /// Notifications received while suppressed.
    withheld: ChangeCategories,
}

impl GateState {
    fn suppressed(&self) -> ChangeCategories {
        ChangeCategories::all()
            .iter()
            .filter(|c| self.counters[slot(*c)] > 0)
            .fold(ChangeCategories::empty(), |acc, c| acc | c)
    }
}

fn slot(single: ChangeCategories) -> usize {
    single.bits().trailing_zeros() as usize
}

/// Forwards change notifications, minus suppressed categories.
///
/// Monitoring starts disabled; the repository loader enables it once the
/// cache is fully populated.
#[derive(Debug)]
pub struct NotificationGate {
    state: Mutex<GateState>,
    requests: EventChannel<RefreshRequest>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            requests: EventChannel::with_capacity(capacity),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enable_monitoring(&self) {
        self.lock().monitoring = true;
        debug!("change monitoring enabled");
    }

    /// Stop forwarding notifications and forget anything withheld.
    pub fn disable(&self) {
        let mut state = self.lock();
        state.monitoring = false;
        state.withheld = ChangeCategories::empty();
        debug!("change monitoring disabled");
    }

    pub fn is_monitoring(&self) -> bool {
        self.lock().monitoring
    }

    /// Receive refresh requests.
    pub fn subscribe(&self) -> EventStream<RefreshRequest> {
        self.requests.subscribe()
    }

    /// Suppress external notifications for `categories` until the returned
    /// guard is dropped.
    pub fn suppress(&self, categories: ChangeCategories) -> SuppressionGuard<'_> {
        let mut state = self.lock();
        for category in categories.iter() {
            state.counters[slot(category)] += 1;
        }
        SuppressionGuard {
            gate: self,
            categories,
        }
    }

    /// Currently suppressed categories.
    pub fn suppressed(&self) -> ChangeCategories {
        self.lock().suppressed()
    }

    /// Report an external change. Returns the categories forwarded as a
    /// refresh request (empty if everything was withheld or monitoring is
    /// off).
    pub fn notify(&self, categories: ChangeCategories) -> ChangeCategories {
        let forwarded = {
            let mut state = self.lock();
            if !state.monitoring {
                return ChangeCategories::empty();
            }
            let suppressed = state.suppressed();
            state.withheld |= categories & suppressed;
            categories - suppressed
        };
        if !forwarded.is_empty() {
            self.requests.emit(RefreshRequest {
                categories: forwarded,
                catch_up: false,
            });
        }
        forwarded
    }

    fn release(&self, categories: ChangeCategories) {
        let released = {
            let mut state = self.lock();
            for category in categories.iter() {
                let counter = &mut state.counters[slot(category)];
                *counter = counter.saturating_sub(1);
            }
            let released = state.withheld - state.suppressed();
            state.withheld -= released;
            if state.monitoring {
                released
            } else {
                ChangeCategories::empty()
            }
        };
        if !released.is_empty() {
            debug!(categories = ?released, "releasing withheld notifications");
            self.requests.emit(RefreshRequest {
                categories: released,
                catch_up: true,
            });
        }
    }
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Active suppression scope. Dropping it lifts the suppression.
#[must_use = "suppression ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuppressionGuard<'a> {
    gate: &'a NotificationGate,
    categories: ChangeCategories,
}

impl SuppressionGuard<'_> {
    pub fn categories(&self) -> ChangeCategories {
        self.categories
    }
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(self.categories);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn monitored() -> NotificationGate {
        let gate = NotificationGate::new();
        gate.enable_monitoring();
        gate
    }

    #[test]
    fn disabled_gate_forwards_nothing() {
        let gate = NotificationGate::new();
        let mut rx = gate.subscribe();
        assert!(gate.notify(ChangeCategories::BRANCHES).is_empty());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn unsuppressed_notification_is_forwarded() {
        let gate = monitored();
        let mut rx = gate.subscribe();
        gate.notify(ChangeCategories::TAGS);
        assert_eq!(
            rx.try_recv().unwrap(),
            RefreshRequest {
                categories: ChangeCategories::TAGS,
                catch_up: false
            }
        );
    }

    #[test]
    fn suppressed_category_is_withheld_then_caught_up() {
        let gate = monitored();
        let mut rx = gate.subscribe();
        {
            let _guard = gate.suppress(ChangeCategories::BRANCHES);
            let forwarded = gate.notify(ChangeCategories::BRANCHES | ChangeCategories::HEAD);
            assert_eq!(forwarded, ChangeCategories::HEAD);
            assert_eq!(rx.try_recv().unwrap().categories, ChangeCategories::HEAD);
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            RefreshRequest {
                categories: ChangeCategories::BRANCHES,
                catch_up: true
            }
        );
        assert!(gate.suppressed().is_empty());
    }

    #[test]
    fn nested_scopes_release_on_last_drop() {
        let gate = monitored();
        let mut rx = gate.subscribe();
        let outer = gate.suppress(ChangeCategories::TAGS);
        let inner = gate.suppress(ChangeCategories::TAGS);
        gate.notify(ChangeCategories::TAGS);
        drop(inner);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(gate.suppressed(), ChangeCategories::TAGS);
        drop(outer);
        assert!(rx.try_recv().unwrap().catch_up);
    }

    #[test]
    fn scope_without_notifications_releases_nothing() {
        let gate = monitored();
        let mut rx = gate.subscribe();
        drop(gate.suppress(ChangeCategories::all()));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn disable_forgets_withheld() {
        let gate = monitored();
        let mut rx = gate.subscribe();
        let guard = gate.suppress(ChangeCategories::STASH);
        gate.notify(ChangeCategories::STASH);
        gate.disable();
        drop(guard);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(!gate.is_monitoring());
    }
}
