//! Working tree summary and in-progress operation state.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use replica_accessor::{RepositoryAccessor, RepositoryStateData, StatusData};
use replica_events::{EventChannel, EventStream};

use crate::error::Result;

/// Latest working tree summary. `changed` fires only when a refresh
/// reports different counts.
pub struct Status {
    accessor: Arc<dyn RepositoryAccessor>,
    data: RwLock<StatusData>,
    changed: EventChannel<StatusData>,
}

impl Status {
    pub fn new(accessor: Arc<dyn RepositoryAccessor>, capacity: usize) -> Self {
        Self {
            accessor,
            data: RwLock::new(StatusData::default()),
            changed: EventChannel::with_capacity(capacity),
        }
    }

    pub fn data(&self) -> StatusData {
        *self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_clean(&self) -> bool {
        self.data().is_clean()
    }

    pub fn subscribe_changed(&self) -> EventStream<StatusData> {
        self.changed.subscribe()
    }

    /// Returns `true` if the summary changed.
    pub fn apply(&self, data: StatusData) -> bool {
        {
            let mut current = self.data.write().unwrap_or_else(PoisonError::into_inner);
            if *current == data {
                return false;
            }
            *current = data;
        }
        debug!(staged = data.staged(), unstaged = data.unstaged(), "status changed");
        self.changed.emit(data);
        true
    }

    pub fn refresh(&self) -> Result<bool> {
        let data = self.accessor.query_status()?;
        Ok(self.apply(data))
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Status").field(&self.data()).finish()
    }
}

/// In-progress operation of the repository (merge, rebase, ...).
pub struct RepositoryState {
    accessor: Arc<dyn RepositoryAccessor>,
    value: RwLock<RepositoryStateData>,
}

impl RepositoryState {
    pub fn new(accessor: Arc<dyn RepositoryAccessor>) -> Self {
        Self {
            accessor,
            value: RwLock::new(RepositoryStateData::default()),
        }
    }

    pub fn get(&self) -> RepositoryStateData {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn refresh(&self) -> Result<RepositoryStateData> {
        let value = self.accessor.query_repository_state()?;
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(value)
    }
}

impl fmt::Debug for RepositoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RepositoryState").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::InMemoryAccessor;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn changed_fires_only_on_difference() {
        let accessor = Arc::new(InMemoryAccessor::new());
        let status = Status::new(accessor.clone(), 8);
        let mut rx = status.subscribe_changed();
        assert!(!status.refresh().unwrap());

        accessor.modify(|f| f.status.unstaged_modified = 2);
        assert!(status.refresh().unwrap());
        assert!(!status.refresh().unwrap());
        assert_eq!(rx.try_recv().unwrap().unstaged_modified, 2);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
        assert!(!status.is_clean());
    }

    #[test]
    fn state_follows_repository() {
        let accessor = Arc::new(InMemoryAccessor::new());
        let state = RepositoryState::new(accessor.clone());
        assert_eq!(state.get(), RepositoryStateData::Clean);
        accessor.modify(|f| f.state = RepositoryStateData::Merging);
        assert_eq!(state.refresh().unwrap(), RepositoryStateData::Merging);
        assert_eq!(state.get(), RepositoryStateData::Merging);
    }
}
