//! Point-in-time capture of reference positions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use replica_refs::{Reference, RefsCollection};
use replica_types::{Hash, ReferenceKey, ReferenceTypes};

/// One captured reference position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefsStateEntry {
    pub key: ReferenceKey,
    pub hash: Hash,
}

/// Immutable snapshot mapping (kind, full name) to the commit hash.
///
/// Entries keep the order they were captured in: local branches, then
/// remote branches, then tags, each by name.
#[derive(Clone, Debug, Serialize)]
pub struct RefsState {
    captured_at: DateTime<Utc>,
    entries: Vec<RefsStateEntry>,
    #[serde(skip)]
    index: HashMap<ReferenceKey, usize>,
}

impl RefsState {
    /// Capture the alive references of the requested kinds.
    ///
    /// Each sub-collection is read under its own lock. References that do
    /// not resolve to a commit are left out.
    pub fn capture(refs: &RefsCollection, types: ReferenceTypes) -> Self {
        let mut entries = Vec::new();
        if types.contains(ReferenceTypes::LOCAL_BRANCHES) {
            refs.heads()
                .collection()
                .with_items(|items| collect(items, &mut entries));
        }
        if types.contains(ReferenceTypes::REMOTE_BRANCHES) {
            refs.remotes()
                .collection()
                .with_items(|items| collect(items, &mut entries));
        }
        if types.contains(ReferenceTypes::TAGS) {
            refs.tags()
                .collection()
                .with_items(|items| collect(items, &mut entries));
        }
        let state = Self::from_entries(entries.into_iter().map(|e| (e.key, e.hash)));
        debug!(types = ?types, entries = state.len(), "refs state captured");
        state
    }

    /// Build a snapshot from explicit positions. A repeated key keeps its
    /// first position and takes the last hash.
    pub fn from_entries(entries: impl IntoIterator<Item = (ReferenceKey, Hash)>) -> Self {
        let mut state = Self {
            captured_at: Utc::now(),
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for (key, hash) in entries {
            match state.index.get(&key) {
                Some(&i) => state.entries[i].hash = hash,
                None => {
                    state.index.insert(key.clone(), state.entries.len());
                    state.entries.push(RefsStateEntry { key, hash });
                }
            }
        }
        state
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn get(&self, key: &ReferenceKey) -> Option<Hash> {
        self.index.get(key).map(|&i| self.entries[i].hash)
    }

    pub fn contains(&self, key: &ReferenceKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn entries(&self) -> &[RefsStateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for RefsState {
    /// Snapshots are equal when they hold the same positions in the same
    /// order; the capture time is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for RefsState {}

fn collect<R: Reference>(
    items: &mut dyn Iterator<Item = &Arc<R>>,
    entries: &mut Vec<RefsStateEntry>,
) {
    entries.extend(items.filter_map(|reference| {
        reference.revision().map(|revision| RefsStateEntry {
            key: reference.key(),
            hash: revision.hash(),
        })
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::{InMemoryAccessor, RepositoryFixture, TagData};
    use replica_refs::RefsContext;
    use replica_types::ReferenceType;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    fn key(full_name: &str) -> ReferenceKey {
        ReferenceKey::parse(full_name).unwrap()
    }

    fn refs() -> RefsCollection {
        let mut fixture = RepositoryFixture::default();
        fixture.heads.insert("main".into(), hash(1));
        fixture.heads.insert("dev".into(), hash(2));
        fixture.remote_branches.insert("origin/main".into(), hash(1));
        fixture.tags.push(TagData::lightweight("v1", hash(3)));
        let accessor = Arc::new(InMemoryAccessor::from_fixture(fixture));
        let refs = RefsCollection::new(&RefsContext::for_accessor(accessor));
        refs.refresh().unwrap();
        refs
    }

    #[test]
    fn capture_orders_by_kind_then_name() {
        let state = RefsState::capture(&refs(), ReferenceTypes::REFERENCES);
        let names: Vec<&str> = state
            .entries()
            .iter()
            .map(|e| e.key.full_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "refs/heads/dev",
                "refs/heads/main",
                "refs/remotes/origin/main",
                "refs/tags/v1",
            ]
        );
        assert_eq!(state.get(&key("refs/tags/v1")), Some(hash(3)));
    }

    #[test]
    fn capture_respects_requested_kinds() {
        let state = RefsState::capture(&refs(), ReferenceTypes::TAGS);
        assert_eq!(state.len(), 1);
        assert!(!state.contains(&key("refs/heads/main")));
    }

    #[test]
    fn deleted_references_are_not_captured() {
        let refs = refs();
        refs.heads().merge_records(Vec::new());
        let state = RefsState::capture(&refs, ReferenceTypes::LOCAL_BRANCHES);
        assert!(state.is_empty());
    }

    #[test]
    fn repeated_key_keeps_first_position() {
        let state = RefsState::from_entries([
            (key("refs/heads/a"), hash(1)),
            (key("refs/heads/b"), hash(2)),
            (key("refs/heads/a"), hash(3)),
        ]);
        assert_eq!(state.len(), 2);
        assert_eq!(state.entries()[0].hash, hash(3));
        assert_eq!(state.entries()[0].key.reference_type, ReferenceType::LocalBranch);
    }

    #[test]
    fn serializes_entries_with_timestamp() {
        let state = RefsState::from_entries([(key("refs/heads/main"), hash(1))]);
        let json = serde_json::to_value(&state).unwrap();
        assert!(json["captured_at"].is_string());
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);
        assert!(json.get("index").is_none());
    }
}
