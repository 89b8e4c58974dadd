//! Name-keyed collection of lifetime objects with merge-refresh.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use replica_events::{EventChannel, EventStream, DEFAULT_CAPACITY};

use crate::error::{CacheError, Result};
use crate::lifetime::{CacheObject, Renamable};

/// Structural change of a collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectionChange {
    Added(String),
    Removed(String),
    /// A deleted object reappeared under its old name.
    Revived(String),
    Renamed { old: String, new: String },
}

/// Outcome of one [`ObjectCollection::merge`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub revived: Vec<String>,
    /// Objects updated in place.
    pub updated: usize,
}

impl MergeSummary {
    /// Returns `true` if the set of alive names changed.
    pub fn is_structural(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.revived.is_empty())
    }
}

struct Inner<T> {
    alive: BTreeMap<String, Arc<T>>,
    /// Deleted objects that may still be revived by the next merge.
    tombstones: HashMap<String, Arc<T>>,
}

enum Pending<T> {
    Added(Arc<T>),
    Removed(Arc<T>),
    Revived(Arc<T>),
}

/// Name-unique collection of [`CacheObject`]s.
///
/// Iteration order is by name. Every structural change fires exactly one
/// [`CollectionChange`], plus `object_added` / `object_removed` for
/// additions and removals. Objects updated in place fire nothing here.
pub struct ObjectCollection<T> {
    inner: RwLock<Inner<T>>,
    object_added: EventChannel<Arc<T>>,
    object_removed: EventChannel<Arc<T>>,
    collection_changed: EventChannel<CollectionChange>,
}

impl<T: CacheObject> ObjectCollection<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a collection whose event channels buffer `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                alive: BTreeMap::new(),
                tombstones: HashMap::new(),
            }),
            object_added: EventChannel::with_capacity(capacity),
            object_removed: EventChannel::with_capacity(capacity),
            collection_changed: EventChannel::with_capacity(capacity),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_get_item(&self, name: &str) -> Option<Arc<T>> {
        self.read().alive.get(name).cloned()
    }

    /// Like [`try_get_item`](Self::try_get_item), failing with
    /// [`CacheError::NotFound`].
    pub fn get(&self, name: &str) -> Result<Arc<T>> {
        self.try_get_item(name).ok_or_else(|| CacheError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().alive.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.read().alive.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.read().alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().alive.is_empty()
    }

    /// Alive objects, ordered by name.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.read().alive.values().cloned().collect()
    }

    /// Run `f` over the alive objects under the read lock.
    pub fn with_items<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &Arc<T>>) -> R) -> R {
        let inner = self.read();
        let mut iter = inner.alive.values();
        f(&mut iter)
    }

    pub fn subscribe_added(&self) -> EventStream<Arc<T>> {
        self.object_added.subscribe()
    }

    pub fn subscribe_removed(&self) -> EventStream<Arc<T>> {
        self.object_removed.subscribe()
    }

    pub fn subscribe_changes(&self) -> EventStream<CollectionChange> {
        self.collection_changed.subscribe()
    }

    /// Insert a new object. Fails if the name is taken by an alive object; a
    /// tombstone with the same name is discarded.
    pub fn add(&self, object: Arc<T>) -> Result<()> {
        let name = object.name();
        {
            let mut inner = self.write();
            if inner.alive.contains_key(&name) {
                return Err(CacheError::DuplicateName { name });
            }
            inner.tombstones.remove(&name);
            inner.alive.insert(name, Arc::clone(&object));
        }
        self.publish(vec![Pending::Added(object)]);
        Ok(())
    }

    /// Remove an object and mark it deleted. It stays revivable until the end
    /// of the next merge.
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        let object = {
            let mut inner = self.write();
            let object = inner.alive.remove(name)?;
            object.mark_as_deleted();
            inner.tombstones.insert(name.to_string(), Arc::clone(&object));
            object
        };
        self.publish(vec![Pending::Removed(Arc::clone(&object))]);
        Some(object)
    }

    /// Reconcile the collection with a freshly queried record list.
    ///
    /// For each record, the object named `key(&record)` is updated in place
    /// with `update` if it exists, revived and updated if it was recently
    /// deleted, or built with `create` otherwise. Alive objects not named by
    /// any record are marked deleted and removed. The whole reconciliation,
    /// lifetime transitions included, runs under one write lock; collection
    /// events fire after the lock is released.
    pub fn merge<R, I, K, U, C>(
        &self,
        records: I,
        key: K,
        mut update: U,
        mut create: C,
    ) -> MergeSummary
    where
        I: IntoIterator<Item = R>,
        K: Fn(&R) -> String,
        U: FnMut(&T, R),
        C: FnMut(R) -> Arc<T>,
    {
        let mut summary = MergeSummary::default();
        let mut pending = Vec::new();
        {
            let mut inner = self.write();
            let mut revivable = std::mem::take(&mut inner.tombstones);
            let mut seen = HashSet::new();

            for record in records {
                let name = key(&record);
                seen.insert(name.clone());
                if let Some(existing) = inner.alive.get(&name) {
                    update(existing, record);
                    summary.updated += 1;
                } else if let Some(object) = revivable.remove(&name) {
                    object.revive();
                    update(&object, record);
                    inner.alive.insert(name.clone(), Arc::clone(&object));
                    summary.revived.push(name);
                    pending.push(Pending::Revived(object));
                } else {
                    let object = create(record);
                    inner.alive.insert(name.clone(), Arc::clone(&object));
                    summary.added.push(name);
                    pending.push(Pending::Added(object));
                }
            }

            let missing: Vec<String> = inner
                .alive
                .keys()
                .filter(|name| !seen.contains(*name))
                .cloned()
                .collect();
            for name in missing {
                if let Some(object) = inner.alive.remove(&name) {
                    object.mark_as_deleted();
                    inner.tombstones.insert(name.clone(), Arc::clone(&object));
                    summary.removed.push(name);
                    pending.push(Pending::Removed(object));
                }
            }
        }

        debug!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            revived = summary.revived.len(),
            updated = summary.updated,
            "collection merged"
        );
        self.publish(pending);
        summary
    }

    /// Upsert a single record without removing anything.
    pub fn merge_item<R, U, C>(&self, name: &str, record: R, update: U, create: C) -> Arc<T>
    where
        U: FnOnce(&T, R),
        C: FnOnce(R) -> Arc<T>,
    {
        let (object, event) = {
            let mut inner = self.write();
            if let Some(existing) = inner.alive.get(name) {
                update(existing, record);
                (Arc::clone(existing), None)
            } else if let Some(object) = inner.tombstones.remove(name) {
                object.revive();
                update(&object, record);
                inner.alive.insert(name.to_string(), Arc::clone(&object));
                (Arc::clone(&object), Some(Pending::Revived(object)))
            } else {
                let object = create(record);
                inner.alive.insert(name.to_string(), Arc::clone(&object));
                (Arc::clone(&object), Some(Pending::Added(object)))
            }
        };
        self.publish(event.into_iter().collect());
        object
    }

    /// Fire collection events in order. Lifetime transitions have already
    /// happened under the lock.
    fn publish(&self, pending: Vec<Pending<T>>) {
        for event in pending {
            match event {
                Pending::Added(object) => {
                    let name = object.name();
                    self.object_added.emit(object);
                    self.collection_changed.emit(CollectionChange::Added(name));
                }
                Pending::Removed(object) => {
                    let name = object.name();
                    self.object_removed.emit(object);
                    self.collection_changed.emit(CollectionChange::Removed(name));
                }
                Pending::Revived(object) => {
                    self.collection_changed
                        .emit(CollectionChange::Revived(object.name()));
                }
            }
        }
    }
}

impl<T: Renamable> ObjectCollection<T> {
    /// Rekey an alive object and update its name in place.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<Arc<T>> {
        let object = {
            let mut inner = self.write();
            if inner.alive.contains_key(new_name) {
                return Err(CacheError::DuplicateName {
                    name: new_name.to_string(),
                });
            }
            let object = inner
                .alive
                .remove(old_name)
                .ok_or_else(|| CacheError::NotFound {
                    name: old_name.to_string(),
                })?;
            object.set_name(new_name);
            inner.tombstones.remove(new_name);
            inner.alive.insert(new_name.to_string(), Arc::clone(&object));
            object
        };
        self.collection_changed.emit(CollectionChange::Renamed {
            old: old_name.to_string(),
            new: new_name.to_string(),
        });
        Ok(object)
    }
}

impl<T: CacheObject> Default for ObjectCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObjectCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ObjectCollection")
            .field("names", &inner.alive.keys().collect::<Vec<_>>())
            .field("tombstones", &inner.tombstones.len())
            .finish()
    }
}
