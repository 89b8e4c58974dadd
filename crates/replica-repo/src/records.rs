//! Record-backed cached objects: configuration, notes, remotes, submodules
//! and contributors.
//!
//! These kinds carry no behavior beyond their data, so they share one
//! object type, [`Record`], keyed by [`NamedRecord::record_name`].

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use replica_accessor::{ConfigParameterData, NoteData, RemoteData, SubmoduleData, UserData};
use replica_cache::{CacheObject, CollectionChange, Lifetime, MergeSummary, ObjectCollection};
use replica_events::EventStream;
use replica_types::User;

/// A data record that identifies itself by name.
pub trait NamedRecord: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn record_name(&self) -> String;
}

impl NamedRecord for ConfigParameterData {
    fn record_name(&self) -> String {
        self.name.clone()
    }
}

impl NamedRecord for NoteData {
    /// Notes are keyed by the object they annotate.
    fn record_name(&self) -> String {
        self.object.to_hex()
    }
}

impl NamedRecord for RemoteData {
    fn record_name(&self) -> String {
        self.name.clone()
    }
}

impl NamedRecord for SubmoduleData {
    fn record_name(&self) -> String {
        self.name.clone()
    }
}

impl NamedRecord for UserData {
    fn record_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Cached object holding the latest record reported under its name.
pub struct Record<D> {
    name: String,
    lifetime: Lifetime,
    data: RwLock<D>,
}

impl<D: NamedRecord> Record<D> {
    fn new(data: D, capacity: usize) -> Self {
        Self {
            name: data.record_name(),
            lifetime: Lifetime::with_capacity(capacity),
            data: RwLock::new(data),
        }
    }

    pub fn data(&self) -> D {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if the record changed.
    fn update(&self, data: D) -> bool {
        let mut current = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if *current == data {
            return false;
        }
        *current = data;
        true
    }
}

impl<D: NamedRecord> CacheObject for Record<D> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }
}

impl<D: NamedRecord> fmt::Debug for Record<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name)
            .field("data", &self.data())
            .field("deleted", &self.lifetime.is_deleted())
            .finish()
    }
}

/// Name-keyed collection of [`Record`]s refreshed by merge.
pub struct RecordCollection<D> {
    objects: ObjectCollection<Record<D>>,
    capacity: usize,
}

pub type ConfigParameter = Record<ConfigParameterData>;
pub type ConfigParameters = RecordCollection<ConfigParameterData>;
pub type Note = Record<NoteData>;
pub type Notes = RecordCollection<NoteData>;
pub type Remote = Record<RemoteData>;
pub type Remotes = RecordCollection<RemoteData>;
pub type Submodule = Record<SubmoduleData>;
pub type Submodules = RecordCollection<SubmoduleData>;
pub type Contributor = Record<UserData>;
pub type Users = RecordCollection<UserData>;

impl<D: NamedRecord> RecordCollection<D> {
    pub fn new(capacity: usize) -> Self {
        Self {
            objects: ObjectCollection::with_capacity(capacity),
            capacity,
        }
    }

    pub fn collection(&self) -> &ObjectCollection<Record<D>> {
        &self.objects
    }

    pub fn try_get_item(&self, name: &str) -> Option<Arc<Record<D>>> {
        self.objects.try_get_item(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.names()
    }

    pub fn count(&self) -> usize {
        self.objects.count()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Current records, ordered by name.
    pub fn records(&self) -> Vec<D> {
        self.objects.with_items(|items| items.map(|r| r.data()).collect())
    }

    pub fn subscribe_changes(&self) -> EventStream<CollectionChange> {
        self.objects.subscribe_changes()
    }

    /// Merge a freshly queried list. A name reported more than once keeps
    /// the last record.
    pub fn merge(&self, records: Vec<D>) -> MergeSummary {
        let capacity = self.capacity;
        self.objects.merge(
            records,
            D::record_name,
            |record, data| {
                record.update(data);
            },
            |data| Arc::new(Record::new(data, capacity)),
        )
    }
}

impl<D: NamedRecord> fmt::Debug for RecordCollection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCollection")
            .field("names", &self.names())
            .finish()
    }
}

impl RecordCollection<ConfigParameterData> {
    /// Effective value of a configuration key.
    pub fn value(&self, name: &str) -> Option<String> {
        self.try_get_item(name).map(|p| p.data().value)
    }

    /// `user.name` and `user.email`, when both are set.
    pub fn user_identity(&self) -> Option<User> {
        Some(User::new(self.value("user.name")?, self.value("user.email")?))
    }
}

impl Record<UserData> {
    pub fn user(&self) -> User {
        let data = self.data();
        User::new(data.name, data.email)
    }
}
