//! Diff between two [`RefsState`] snapshots.

use std::fmt;

use serde::Serialize;

use replica_types::{Hash, ReferenceKey, ReferenceType};

use crate::state::RefsState;

/// How a reference changed between two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Moved,
}

/// One changed reference.
///
/// `old_hash` is `None` for [`ChangeType::Added`] and `new_hash` is `None`
/// for [`ChangeType::Removed`]; a move carries both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceChange {
    pub reference_type: ReferenceType,
    pub full_name: String,
    pub short_name: String,
    pub old_hash: Option<Hash>,
    pub new_hash: Option<Hash>,
    pub change_type: ChangeType,
}

impl ReferenceChange {
    fn new(key: &ReferenceKey, old: Option<Hash>, new: Option<Hash>, kind: ChangeType) -> Self {
        Self {
            reference_type: key.reference_type,
            full_name: key.full_name.clone(),
            short_name: key.short_name().to_string(),
            old_hash: old,
            new_hash: new,
            change_type: kind,
        }
    }

    pub fn added(key: &ReferenceKey, hash: Hash) -> Self {
        Self::new(key, None, Some(hash), ChangeType::Added)
    }

    pub fn removed(key: &ReferenceKey, hash: Hash) -> Self {
        Self::new(key, Some(hash), None, ChangeType::Removed)
    }

    pub fn moved(key: &ReferenceKey, old: Hash, new: Hash) -> Self {
        Self::new(key, Some(old), Some(new), ChangeType::Moved)
    }

    pub fn key(&self) -> ReferenceKey {
        ReferenceKey::new(self.reference_type, self.full_name.clone())
    }

    /// The same change seen from the other side.
    pub fn inverse(&self) -> Self {
        let change_type = match self.change_type {
            ChangeType::Added => ChangeType::Removed,
            ChangeType::Removed => ChangeType::Added,
            ChangeType::Moved => ChangeType::Moved,
        };
        Self {
            old_hash: self.new_hash,
            new_hash: self.old_hash,
            change_type,
            ..self.clone()
        }
    }
}

impl fmt::Display for ReferenceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = |hash: Option<Hash>| hash.map(|h| h.short_hex()).unwrap_or_default();
        match self.change_type {
            ChangeType::Added => write!(f, "+ {} {}", self.full_name, short(self.new_hash)),
            ChangeType::Removed => write!(f, "- {} {}", self.full_name, short(self.old_hash)),
            ChangeType::Moved => write!(
                f,
                "~ {} {}..{}",
                self.full_name,
                short(self.old_hash),
                short(self.new_hash)
            ),
        }
    }
}

/// The changes that turn one snapshot into another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefsDiff {
    pub changes: Vec<ReferenceChange>,
}

impl RefsDiff {
    /// Compare two snapshots.
    ///
    /// Entries of `after` come first, in `after`'s order: `Added` when the
    /// key is new, `Moved` when its hash differs. Keys of `before` missing
    /// from `after` follow as `Removed`, in `before`'s order.
    pub fn calculate(before: &RefsState, after: &RefsState) -> Self {
        let mut changes = Vec::new();
        for entry in after.entries() {
            match before.get(&entry.key) {
                None => changes.push(ReferenceChange::added(&entry.key, entry.hash)),
                Some(old) if old != entry.hash => {
                    changes.push(ReferenceChange::moved(&entry.key, old, entry.hash))
                }
                Some(_) => {}
            }
        }
        for entry in before.entries() {
            if !after.contains(&entry.key) {
                changes.push(ReferenceChange::removed(&entry.key, entry.hash));
            }
        }
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.count(ChangeType::Added)
    }

    pub fn removals(&self) -> usize {
        self.count(ChangeType::Removed)
    }

    pub fn moves(&self) -> usize {
        self.count(ChangeType::Moved)
    }

    fn count(&self, kind: ChangeType) -> usize {
        self.changes.iter().filter(|c| c.change_type == kind).count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReferenceChange> {
        self.changes.iter()
    }

    /// Changes of one reference kind.
    pub fn of_type(&self, reference_type: ReferenceType) -> impl Iterator<Item = &ReferenceChange> {
        self.changes
            .iter()
            .filter(move |c| c.reference_type == reference_type)
    }
}

impl<'a> IntoIterator for &'a RefsDiff {
    type Item = &'a ReferenceChange;
    type IntoIter = std::slice::Iter<'a, ReferenceChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
