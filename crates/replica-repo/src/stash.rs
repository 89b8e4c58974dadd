//! Stash entries keyed by the hash of their commit.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use replica_cache::{CacheObject, Lifetime, MergeSummary, ObjectCollection};
use replica_revisions::{Revision, RevisionCache};
use replica_types::Hash;

use crate::error::Result;

/// One stash entry. The index (`stash@{n}`) shifts as entries are pushed
/// or dropped; the hash does not.
pub struct StashedState {
    index: AtomicUsize,
    revision: Arc<Revision>,
    lifetime: Lifetime,
}

impl StashedState {
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    pub fn revision(&self) -> &Arc<Revision> {
        &self.revision
    }

    pub fn hash(&self) -> Hash {
        self.revision.hash()
    }

    /// `stash@{n}`
    pub fn reference_name(&self) -> String {
        format!("stash@{{{}}}", self.index())
    }
}

impl CacheObject for StashedState {
    fn name(&self) -> String {
        self.revision.hash().to_hex()
    }

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
}

impl fmt::Debug for StashedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.reference_name(), self.revision)
    }
}

#[derive(Debug)]
pub struct StashedStates {
    revisions: Arc<RevisionCache>,
    objects: ObjectCollection<StashedState>,
    capacity: usize,
}

impl StashedStates {
    pub fn new(revisions: Arc<RevisionCache>, capacity: usize) -> Self {
        Self {
            revisions,
            objects: ObjectCollection::with_capacity(capacity),
            capacity,
        }
    }

    pub fn collection(&self) -> &ObjectCollection<StashedState> {
        &self.objects
    }

    pub fn count(&self) -> usize {
        self.objects.count()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn try_get_item(&self, hash: &Hash) -> Option<Arc<StashedState>> {
        self.objects.try_get_item(&hash.to_hex())
    }

    /// Entries ordered by index, newest first.
    pub fn all(&self) -> Vec<Arc<StashedState>> {
        let mut states = self.objects.items();
        states.sort_by_key(|s| s.index());
        states
    }

    /// `stash@{0}`.
    pub fn top(&self) -> Option<Arc<StashedState>> {
        self.objects
            .with_items(|items| items.min_by_key(|s| s.index()).cloned())
    }

    pub fn refresh(&self) -> Result<MergeSummary> {
        let records = self.revisions.accessor().query_stash()?;
        let summary = self.merge(
            records
                .into_iter()
                .map(|data| (data.index, self.revisions.resolve_one(data.revision)))
                .collect(),
        );
        debug!(count = self.count(), "stash refreshed");
        Ok(summary)
    }

    /// Drop every entry, for a repository that reports no stash.
    pub fn clear(&self) -> MergeSummary {
        self.merge(Vec::new())
    }

    fn merge(&self, entries: Vec<(usize, Arc<Revision>)>) -> MergeSummary {
        let capacity = self.capacity;
        self.objects.merge(
            entries,
            |(_, revision)| revision.hash().to_hex(),
            |state, (index, _)| state.index.store(index, Ordering::Release),
            |(index, revision)| {
                Arc::new(StashedState {
                    index: AtomicUsize::new(index),
                    revision,
                    lifetime: Lifetime::with_capacity(capacity),
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::{InMemoryAccessor, RevisionData};

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    fn setup(entries: &[u8]) -> (Arc<InMemoryAccessor>, StashedStates) {
        let accessor = Arc::new(InMemoryAccessor::new());
        let entries: Vec<RevisionData> = entries
            .iter()
            .map(|b| RevisionData::new(hash(*b), format!("WIP {b}")))
            .collect();
        accessor.modify(|f| f.stash = entries);
        let revisions = Arc::new(RevisionCache::new(accessor.clone()));
        (accessor, StashedStates::new(revisions, 8))
    }

    #[test]
    fn entries_ordered_by_index() {
        let (_, stash) = setup(&[3, 2, 1]);
        stash.refresh().unwrap();
        let hashes: Vec<Hash> = stash.all().iter().map(|s| s.hash()).collect();
        assert_eq!(hashes, vec![hash(3), hash(2), hash(1)]);
        assert_eq!(stash.top().unwrap().reference_name(), "stash@{0}");
        assert_eq!(stash.top().unwrap().revision().subject(), "WIP 3");
    }

    #[test]
    fn push_renumbers_in_place() {
        let (accessor, stash) = setup(&[1]);
        stash.refresh().unwrap();
        let first = stash.try_get_item(&hash(1)).unwrap();
        accessor.modify(|f| f.stash.insert(0, RevisionData::new(hash(2), "WIP 2")));
        let summary = stash.refresh().unwrap();
        assert_eq!(summary.added, vec![hash(2).to_hex()]);
        assert!(Arc::ptr_eq(&first, &stash.try_get_item(&hash(1)).unwrap()));
        assert_eq!(first.index(), 1);
    }

    #[test]
    fn drop_deletes_entry() {
        let (accessor, stash) = setup(&[2, 1]);
        stash.refresh().unwrap();
        let dropped = stash.try_get_item(&hash(2)).unwrap();
        accessor.modify(|f| {
            f.stash.remove(0);
        });
        stash.refresh().unwrap();
        assert!(dropped.is_deleted());
        assert_eq!(stash.top().unwrap().index(), 0);
        assert_eq!(stash.clear().removed.len(), 1);
        assert!(stash.is_empty());
    }
}
