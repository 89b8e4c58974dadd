//! The combined view of branches, remote branches and tags.

use std::sync::Arc;

use tracing::debug;

use replica_accessor::{
    BranchQueryMode, BranchRestriction, QueryBranchesParameters, ReferencesData,
};
use replica_cache::MergeSummary;
use replica_revisions::Revision;
use replica_types::{Hash, ReferenceKey, ReferenceType, ReferenceTypes};

use crate::branch::{Branch, Branches};
use crate::context::RefsContext;
use crate::error::{RefError, Result};
use crate::pointer::Pointer;
use crate::remote_branch::{RemoteBranch, RemoteBranches};
use crate::tag::Tags;

/// What one refresh of a [`RefsCollection`] did.
///
/// A summary is `None` when its kind was not part of the refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub heads: Option<MergeSummary>,
    pub remotes: Option<MergeSummary>,
    pub tags: Option<MergeSummary>,
    /// Target of `refs/stash`, when the stash was part of the refresh and
    /// exists.
    pub stash: Option<Hash>,
}

impl RefreshOutcome {
    pub fn has_stash(&self) -> bool {
        self.stash.is_some()
    }
}

/// Branches containing a given commit, resolved to cached instances.
#[derive(Clone, Debug, Default)]
pub struct ContainingBranches {
    pub local: Vec<Arc<Branch>>,
    pub remote: Vec<Arc<RemoteBranch>>,
}

/// Local branches, remote branches and tags of one repository.
#[derive(Debug)]
pub struct RefsCollection {
    context: Arc<RefsContext>,
    heads: Arc<Branches>,
    remotes: Arc<RemoteBranches>,
    tags: Arc<Tags>,
}

impl RefsCollection {
    pub fn new(context: &Arc<RefsContext>) -> Self {
        Self {
            context: Arc::clone(context),
            heads: Arc::new(Branches::new(context)),
            remotes: Arc::new(RemoteBranches::new(context)),
            tags: Arc::new(Tags::new(context)),
        }
    }

    pub fn context(&self) -> &Arc<RefsContext> {
        &self.context
    }

    pub fn heads(&self) -> &Arc<Branches> {
        &self.heads
    }

    pub fn remotes(&self) -> &Arc<RemoteBranches> {
        &self.remotes
    }

    pub fn tags(&self) -> &Arc<Tags> {
        &self.tags
    }

    /// Resynchronize every kind (and check the stash) with one query.
    pub fn refresh(&self) -> Result<RefreshOutcome> {
        self.refresh_types(ReferenceTypes::ALL)
    }

    /// Resynchronize the selected kinds with one scoped query.
    pub fn refresh_types(&self, types: ReferenceTypes) -> Result<RefreshOutcome> {
        let data = self.context.accessor().query_references(types)?;
        Ok(self.apply(types, data))
    }

    /// Merge an already queried result into the selected kinds.
    pub fn apply(&self, types: ReferenceTypes, data: ReferencesData) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();
        if types.contains(ReferenceTypes::LOCAL_BRANCHES) {
            outcome.heads = Some(self.heads.merge_records(data.heads.unwrap_or_default()));
        }
        if types.contains(ReferenceTypes::REMOTE_BRANCHES) {
            outcome.remotes = Some(self.remotes.merge_records(data.remotes.unwrap_or_default()));
        }
        if types.contains(ReferenceTypes::TAGS) {
            outcome.tags = Some(self.tags.merge_records(data.tags.unwrap_or_default()));
        }
        if types.contains(ReferenceTypes::STASH) {
            outcome.stash = data.stash;
        }
        debug!(types = ?types, stash = outcome.has_stash(), "references refreshed");
        outcome
    }

    /// [`refresh_types`](Self::refresh_types) on the blocking pool.
    pub async fn refresh_async(self: Arc<Self>, types: ReferenceTypes) -> Result<RefreshOutcome> {
        tokio::task::spawn_blocking(move || self.refresh_types(types))
            .await
            .map_err(|e| RefError::Task {
                message: e.to_string(),
            })?
    }

    /// Local and remote branches whose history contains `revision`.
    pub fn get_branches_containing(&self, revision: &Revision) -> Result<ContainingBranches> {
        let records = self
            .context
            .accessor()
            .query_branches(&QueryBranchesParameters::new(
                BranchRestriction::All,
                BranchQueryMode::Contains(revision.hash()),
            ))?;
        let mut result = ContainingBranches::default();
        for data in records {
            if data.is_remote {
                result.remote.extend(self.remotes.try_get_item(&data.name));
            } else {
                result.local.extend(self.heads.try_get_item(&data.name));
            }
        }
        Ok(result)
    }

    /// Cached reference identified by `key`.
    pub fn find(&self, key: &ReferenceKey) -> Option<Pointer> {
        let name = key.short_name();
        match key.reference_type {
            ReferenceType::LocalBranch => self.heads.try_get_item(name).map(Pointer::Branch),
            ReferenceType::RemoteBranch => {
                self.remotes.try_get_item(name).map(Pointer::RemoteBranch)
            }
            ReferenceType::Tag => self.tags.try_get_item(name).map(Pointer::Tag),
            ReferenceType::Stash | ReferenceType::Head => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::{InMemoryAccessor, RepositoryFixture, RevisionData, TagData};
    use replica_cache::CacheObject;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    fn fixture() -> RepositoryFixture {
        let mut fixture = RepositoryFixture::default();
        fixture.revisions = vec![
            RevisionData::new(hash(1), "base"),
            RevisionData::new(hash(2), "tip").with_parents(vec![hash(1)]),
        ];
        fixture.heads.insert("main".into(), hash(2));
        fixture.heads.insert("old".into(), hash(1));
        fixture.remote_branches.insert("origin/main".into(), hash(1));
        fixture.tags.push(TagData::lightweight("v1", hash(1)));
        fixture
    }

    fn setup(fixture: RepositoryFixture) -> (Arc<InMemoryAccessor>, Arc<RefsCollection>) {
        let accessor = Arc::new(InMemoryAccessor::from_fixture(fixture));
        let refs = Arc::new(RefsCollection::new(&RefsContext::for_accessor(accessor.clone())));
        (accessor, refs)
    }

    #[test]
    fn full_refresh_uses_one_query() {
        let (accessor, refs) = setup(fixture());
        let outcome = refs.refresh().unwrap();
        assert_eq!(accessor.calls(), vec!["query_references"]);
        assert_eq!(outcome.heads.unwrap().added.len(), 2);
        assert_eq!(outcome.remotes.unwrap().added, vec!["origin/main"]);
        assert_eq!(outcome.tags.unwrap().added, vec!["v1"]);
        assert!(outcome.stash.is_none());
    }

    #[test]
    fn scoped_refresh_leaves_other_kinds_alone() {
        let (accessor, refs) = setup(fixture());
        refs.refresh().unwrap();
        accessor.modify(|f| {
            f.tags.clear();
            f.heads.remove("old");
        });
        let outcome = refs.refresh_types(ReferenceTypes::TAGS).unwrap();
        assert!(outcome.heads.is_none());
        assert_eq!(outcome.tags.unwrap().removed, vec!["v1"]);
        assert!(refs.heads().contains("old"));
    }

    #[test]
    fn stash_presence_is_reported() {
        let mut with_stash = fixture();
        with_stash.stash = vec![RevisionData::new(hash(9), "WIP on main")];
        let (_, refs) = setup(with_stash);
        assert_eq!(refs.refresh().unwrap().stash, Some(hash(9)));
        assert!(refs
            .refresh_types(ReferenceTypes::BRANCHES)
            .unwrap()
            .stash
            .is_none());
    }

    #[test]
    fn branches_containing_resolve_to_cached_instances() {
        let (_, refs) = setup(fixture());
        refs.refresh().unwrap();
        let base = refs.context().revisions().get_or_create_revision(hash(1));
        let containing = refs.get_branches_containing(&base).unwrap();
        let local: Vec<_> = containing.local.iter().map(|b| b.name()).collect();
        assert_eq!(local, vec!["main", "old"]);
        assert_eq!(containing.remote.len(), 1);
        assert!(Arc::ptr_eq(
            &containing.local[0],
            &refs.heads().try_get_item("main").unwrap()
        ));

        let tip = refs.context().revisions().get_or_create_revision(hash(2));
        let containing = refs.get_branches_containing(&tip).unwrap();
        assert_eq!(containing.local.len(), 1);
        assert!(containing.remote.is_empty());
    }

    #[test]
    fn find_by_key() {
        let (_, refs) = setup(fixture());
        refs.refresh().unwrap();
        let key = ReferenceKey::parse("refs/tags/v1").unwrap();
        assert!(matches!(refs.find(&key), Some(Pointer::Tag(_))));
        let key = ReferenceKey::parse("refs/heads/missing").unwrap();
        assert!(refs.find(&key).is_none());
    }

    #[tokio::test]
    async fn async_refresh() {
        let (_, refs) = setup(fixture());
        let outcome = Arc::clone(&refs)
            .refresh_async(ReferenceTypes::REFERENCES)
            .await
            .unwrap();
        assert!(outcome.heads.is_some());
        assert_eq!(refs.heads().count(), 2);
    }
}
