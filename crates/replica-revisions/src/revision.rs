use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use replica_accessor::RevisionData;
use replica_types::{Hash, ReferenceKey, Signature};

use crate::links::ReferenceLinks;

#[derive(Debug, Default)]
struct Details {
    subject: String,
    body: String,
    tree_hash: Option<Hash>,
    parents: Vec<Arc<Revision>>,
    author: Option<Signature>,
    committer: Option<Signature>,
    is_loaded: bool,
}

/// A commit, unique per hash within a [`RevisionCache`](crate::RevisionCache).
///
/// The hash never changes. Everything else starts empty for a stub and is
/// filled in place once the commit has been queried, so holders of the
/// `Arc` see the richer data without re-fetching the instance.
pub struct Revision {
    hash: Hash,
    details: RwLock<Details>,
    links: Arc<ReferenceLinks>,
}

impl Revision {
    pub(crate) fn stub(hash: Hash, links: Arc<ReferenceLinks>) -> Self {
        Self {
            hash,
            details: RwLock::new(Details::default()),
            links,
        }
    }

    fn details(&self) -> RwLockReadGuard<'_, Details> {
        self.details.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// `false` for a hash-only stub.
    pub fn is_loaded(&self) -> bool {
        self.details().is_loaded
    }

    pub fn subject(&self) -> String {
        self.details().subject.clone()
    }

    pub fn body(&self) -> String {
        self.details().body.clone()
    }

    pub fn tree_hash(&self) -> Option<Hash> {
        self.details().tree_hash
    }

    /// Parents in order, first parent first.
    pub fn parents(&self) -> Vec<Arc<Revision>> {
        self.details().parents.clone()
    }

    pub fn author(&self) -> Option<Signature> {
        self.details().author.clone()
    }

    pub fn committer(&self) -> Option<Signature> {
        self.details().committer.clone()
    }

    /// References currently resolving to this revision.
    pub fn references(&self) -> Vec<ReferenceKey> {
        self.links.of(&self.hash)
    }

    /// Populate from a record. `parents` are the cached instances for
    /// `data.parents`, in the same order.
    pub(crate) fn fill(&self, data: RevisionData, parents: Vec<Arc<Revision>>) {
        let mut details = self.details.write().unwrap_or_else(PoisonError::into_inner);
        details.subject = data.subject;
        details.body = data.body;
        details.tree_hash = data.tree_hash;
        details.parents = parents;
        details.author = data.author;
        details.committer = data.committer;
        details.is_loaded = true;
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Revision {}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revision")
            .field("hash", &self.hash)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self.details();
        if details.subject.is_empty() {
            write!(f, "{}", self.hash.short_hex())
        } else {
            write!(f, "{} {}", self.hash.short_hex(), details.subject)
        }
    }
}
