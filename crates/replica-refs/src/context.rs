use std::sync::Arc;

use replica_accessor::RepositoryAccessor;
use replica_events::{NotificationGate, DEFAULT_CAPACITY};
use replica_revisions::{ReferenceLinks, RevisionCache};

/// Services shared by every reference of one repository.
#[derive(Debug)]
pub struct RefsContext {
    revisions: Arc<RevisionCache>,
    gate: Arc<NotificationGate>,
    capacity: usize,
}

impl RefsContext {
    pub fn new(revisions: Arc<RevisionCache>, gate: Arc<NotificationGate>, capacity: usize) -> Self {
        Self {
            revisions,
            gate,
            capacity,
        }
    }

    /// A context over a fresh revision cache and gate, with default capacity.
    pub fn for_accessor(accessor: Arc<dyn RepositoryAccessor>) -> Arc<Self> {
        Arc::new(Self::new(
            Arc::new(RevisionCache::new(accessor)),
            Arc::new(NotificationGate::new()),
            DEFAULT_CAPACITY,
        ))
    }

    pub fn accessor(&self) -> &Arc<dyn RepositoryAccessor> {
        self.revisions.accessor()
    }

    pub fn revisions(&self) -> &Arc<RevisionCache> {
        &self.revisions
    }

    pub fn links(&self) -> &Arc<ReferenceLinks> {
        self.revisions.links()
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// Event channel capacity for objects created in this context.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
