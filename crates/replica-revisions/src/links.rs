use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use replica_types::{Hash, ReferenceKey};

/// Which references currently resolve to which revision.
///
/// Owned by the revision cache and maintained by references as their
/// position changes. Keys are reference identities, not objects, so the
/// association never keeps a reference alive.
#[derive(Debug, Default)]
pub struct ReferenceLinks {
    by_revision: Mutex<HashMap<Hash, BTreeSet<ReferenceKey>>>,
}

impl ReferenceLinks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Hash, BTreeSet<ReferenceKey>>> {
        self.by_revision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach(&self, reference: &ReferenceKey, revision: &Hash) {
        self.lock()
            .entry(*revision)
            .or_default()
            .insert(reference.clone());
    }

    pub fn detach(&self, reference: &ReferenceKey, revision: &Hash) {
        let mut map = self.lock();
        if let Some(set) = map.get_mut(revision) {
            set.remove(reference);
            if set.is_empty() {
                map.remove(revision);
            }
        }
    }

    /// Replace `old` by `new` in the set of `revision` (reference renamed).
    pub fn rekey(&self, old: &ReferenceKey, new: &ReferenceKey, revision: &Hash) {
        let mut map = self.lock();
        let set = map.entry(*revision).or_default();
        set.remove(old);
        set.insert(new.clone());
    }

    /// References pointing at `revision`, ordered by kind then name.
    pub fn of(&self, revision: &Hash) -> Vec<ReferenceKey> {
        self.lock()
            .get(revision)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_types::ReferenceType;

    fn branch(name: &str) -> ReferenceKey {
        ReferenceKey::from_short_name(ReferenceType::LocalBranch, name)
    }

    #[test]
    fn attach_detach() {
        let links = ReferenceLinks::new();
        let h = Hash::from_bytes([1; 20]);
        links.attach(&branch("main"), &h);
        links.attach(&branch("dev"), &h);
        assert_eq!(links.of(&h), vec![branch("dev"), branch("main")]);
        links.detach(&branch("dev"), &h);
        links.detach(&branch("main"), &h);
        assert!(links.of(&h).is_empty());
    }

    #[test]
    fn rekey_moves_membership() {
        let links = ReferenceLinks::new();
        let h = Hash::from_bytes([2; 20]);
        links.attach(&branch("old"), &h);
        links.rekey(&branch("old"), &branch("new"), &h);
        assert_eq!(links.of(&h), vec![branch("new")]);
    }
}
