//! Remote-tracking branches.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use replica_accessor::{
    BranchData, BranchQueryMode, BranchRestriction, DeleteBranchParameters,
    QueryBranchesParameters,
};
use replica_cache::{CacheObject, Lifetime, MergeSummary, ObjectCollection};
use replica_events::ChangeCategories;
use replica_types::{split_remote_branch_name, ReferenceKey, ReferenceType};

use crate::context::RefsContext;
use crate::error::Result;
use crate::pointer::Pointer;
use crate::reference::{Reference, ReferenceCore};

/// A remote-tracking branch (`refs/remotes/<remote>/<branch>`), short name
/// `<remote>/<branch>`.
pub struct RemoteBranch {
    core: ReferenceCore,
}

impl RemoteBranch {
    pub(crate) fn from_data(context: &Arc<RefsContext>, data: BranchData) -> Arc<Self> {
        let revision = context.revisions().get_or_create_revision(data.target);
        Arc::new(Self {
            core: ReferenceCore::new(
                context,
                ReferenceKey::from_short_name(ReferenceType::RemoteBranch, &data.name),
                Pointer::Revision(revision),
            ),
        })
    }

    pub(crate) fn update(&self, data: BranchData) {
        let revision = self
            .core
            .context()
            .revisions()
            .get_or_create_revision(data.target);
        self.core.set_pointer(Pointer::Revision(revision));
    }

    /// Name of the remote (`origin` for `origin/main`).
    pub fn remote_name(&self) -> String {
        let name = self.core.short_name();
        split_remote_branch_name(&name)
            .map(|(remote, _)| remote.to_string())
            .unwrap_or(name)
    }

    /// Branch name on the remote (`main` for `origin/main`).
    pub fn branch_name(&self) -> String {
        let name = self.core.short_name();
        split_remote_branch_name(&name)
            .map(|(_, branch)| branch.to_string())
            .unwrap_or(name)
    }
}

impl Reference for RemoteBranch {
    fn core(&self) -> &ReferenceCore {
        &self.core
    }
}

impl CacheObject for RemoteBranch {
    fn name(&self) -> String {
        self.core.short_name()
    }

    fn lifetime(&self) -> &Lifetime {
        self.core.lifetime()
    }

    fn on_deleted(&self) {
        self.core.unlink();
    }

    fn on_revived(&self) {
        self.core.link();
    }
}

impl fmt::Debug for RemoteBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt(f)
    }
}

/// Cached remote-tracking branches of every remote.
#[derive(Debug)]
pub struct RemoteBranches {
    context: Arc<RefsContext>,
    items: ObjectCollection<RemoteBranch>,
}

impl RemoteBranches {
    pub fn new(context: &Arc<RefsContext>) -> Self {
        Self {
            context: Arc::clone(context),
            items: ObjectCollection::with_capacity(context.capacity()),
        }
    }

    pub fn collection(&self) -> &ObjectCollection<RemoteBranch> {
        &self.items
    }

    pub fn try_get_item(&self, name: &str) -> Option<Arc<RemoteBranch>> {
        self.items.try_get_item(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.items.names()
    }

    pub fn count(&self) -> usize {
        self.items.count()
    }

    pub fn all(&self) -> Vec<Arc<RemoteBranch>> {
        self.items.items()
    }

    /// Branches tracked from `remote`.
    pub fn for_remote(&self, remote: &str) -> Vec<Arc<RemoteBranch>> {
        self.items.with_items(|items| {
            items
                .filter(|b| b.remote_name() == remote)
                .cloned()
                .collect()
        })
    }

    pub fn merge_records(&self, records: Vec<BranchData>) -> MergeSummary {
        self.items.merge(
            records,
            |data| data.name.clone(),
            |branch, data| branch.update(data),
            |data| RemoteBranch::from_data(&self.context, data),
        )
    }

    pub fn refresh(&self) -> Result<MergeSummary> {
        let records = self
            .context
            .accessor()
            .query_branches(&QueryBranchesParameters::new(
                BranchRestriction::Remote,
                BranchQueryMode::Default,
            ))?;
        Ok(self.merge_records(records))
    }

    /// Delete the remote-tracking branch locally.
    pub fn delete(&self, branch: &RemoteBranch) -> Result<()> {
        let name = branch.name();
        branch.lifetime().ensure_alive(&name)?;
        let _scope = self
            .context
            .gate()
            .suppress(ChangeCategories::REMOTE_BRANCHES);
        self.context
            .accessor()
            .delete_branch(&DeleteBranchParameters {
                name: name.clone(),
                remote: true,
                force: false,
            })?;
        self.items.remove(&name);
        info!(name = %name, "remote branch deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::{InMemoryAccessor, RepositoryFixture};
    use replica_types::Hash;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    fn setup() -> (Arc<InMemoryAccessor>, RemoteBranches) {
        let mut fixture = RepositoryFixture::default();
        fixture.remote_branches.insert("origin/main".into(), hash(1));
        fixture.remote_branches.insert("origin/feature/x".into(), hash(2));
        fixture.remote_branches.insert("upstream/main".into(), hash(1));
        let accessor = Arc::new(InMemoryAccessor::from_fixture(fixture));
        let remotes = RemoteBranches::new(&RefsContext::for_accessor(accessor.clone()));
        remotes.refresh().unwrap();
        (accessor, remotes)
    }

    #[test]
    fn names_split_into_remote_and_branch() {
        let (_, remotes) = setup();
        let feature = remotes.try_get_item("origin/feature/x").unwrap();
        assert_eq!(feature.remote_name(), "origin");
        assert_eq!(feature.branch_name(), "feature/x");
        assert_eq!(feature.key().full_name, "refs/remotes/origin/feature/x");
    }

    #[test]
    fn grouped_by_remote() {
        let (_, remotes) = setup();
        assert_eq!(remotes.for_remote("origin").len(), 2);
        assert_eq!(remotes.for_remote("upstream").len(), 1);
        assert!(remotes.for_remote("nowhere").is_empty());
    }

    #[test]
    fn delete_removes_locally() {
        let (accessor, remotes) = setup();
        let branch = remotes.try_get_item("upstream/main").unwrap();
        remotes.delete(&branch).unwrap();
        assert!(branch.is_deleted());
        assert!(!accessor.fixture().remote_branches.contains_key("upstream/main"));
        assert_eq!(remotes.count(), 2);
    }
}
