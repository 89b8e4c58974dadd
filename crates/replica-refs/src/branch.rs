//! Local branches.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tracing::{debug, info};

use replica_accessor::{
    AccessorError, BranchData, BranchQueryMode, BranchRestriction, CreateBranchParameters,
    DeleteBranchParameters, QueryBranchesParameters,
};
use replica_cache::{CacheObject, Lifetime, MergeSummary, ObjectCollection, Renamable};
use replica_events::ChangeCategories;
use replica_revisions::Revision;
use replica_types::{ReferenceKey, ReferenceType};

use crate::context::RefsContext;
use crate::error::Result;
use crate::names::validate_branch_name;
use crate::pointer::Pointer;
use crate::reference::{PointerUpdate, Reference, ReferenceCore};

/// Notified synchronously when a followed branch moves.
pub trait PositionFollower: Send + Sync {
    fn branch_moved(&self, branch: &Branch);
}

/// A local branch (`refs/heads/...`).
pub struct Branch {
    core: ReferenceCore,
    upstream: RwLock<Option<String>>,
    followers: Mutex<Vec<Weak<dyn PositionFollower>>>,
}

impl Branch {
    pub(crate) fn from_data(context: &Arc<RefsContext>, data: BranchData) -> Arc<Self> {
        let revision = context.revisions().get_or_create_revision(data.target);
        Arc::new(Self {
            core: ReferenceCore::new(
                context,
                ReferenceKey::from_short_name(ReferenceType::LocalBranch, &data.name),
                Pointer::Revision(revision),
            ),
            upstream: RwLock::new(data.upstream),
            followers: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn update(&self, data: BranchData) -> PointerUpdate {
        *self.upstream.write().unwrap_or_else(PoisonError::into_inner) = data.upstream;
        let revision = self
            .core
            .context()
            .revisions()
            .get_or_create_revision(data.target);
        self.set_revision(revision)
    }

    /// Move the branch, notifying followers if its position changed.
    pub(crate) fn set_revision(&self, revision: Arc<Revision>) -> PointerUpdate {
        let update = self.core.set_pointer(Pointer::Revision(revision));
        if update.position_changed {
            self.notify_followers();
        }
        update
    }

    /// Short name of the upstream branch, if tracking is configured.
    pub fn upstream(&self) -> Option<String> {
        self.upstream
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn add_follower(&self, follower: Weak<dyn PositionFollower>) {
        let mut followers = self.followers.lock().unwrap_or_else(PoisonError::into_inner);
        if !followers.iter().any(|f| f.ptr_eq(&follower)) {
            followers.push(follower);
        }
    }

    pub(crate) fn remove_follower(&self, follower: &Weak<dyn PositionFollower>) {
        self.followers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|f| !f.ptr_eq(follower));
    }

    pub fn follower_count(&self) -> usize {
        self.followers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|f| f.strong_count() > 0)
            .count()
    }

    fn notify_followers(&self) {
        let followers: Vec<Arc<dyn PositionFollower>> = {
            let mut followers = self.followers.lock().unwrap_or_else(PoisonError::into_inner);
            followers.retain(|f| f.strong_count() > 0);
            followers.iter().filter_map(Weak::upgrade).collect()
        };
        for follower in followers {
            follower.branch_moved(self);
        }
    }
}

impl Reference for Branch {
    fn core(&self) -> &ReferenceCore {
        &self.core
    }
}

impl CacheObject for Branch {
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

impl Renamable for Branch {
    fn set_name(&self, name: &str) {
        self.core.rename(name);
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt(f)
    }
}

/// Cached local branches.
///
/// Mutations validate names locally, run the external command while
/// suppressing [`ChangeCategories::BRANCHES`] notifications, and only then
/// update the cache from a fresh query.
#[derive(Debug)]
pub struct Branches {
    context: Arc<RefsContext>,
    items: ObjectCollection<Branch>,
}

impl Branches {
    pub fn new(context: &Arc<RefsContext>) -> Self {
        Self {
            context: Arc::clone(context),
            items: ObjectCollection::with_capacity(context.capacity()),
        }
    }

    /// The underlying collection, for events and iteration.
    pub fn collection(&self) -> &ObjectCollection<Branch> {
        &self.items
    }

    pub fn try_get_item(&self, name: &str) -> Option<Arc<Branch>> {
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

    pub fn all(&self) -> Vec<Arc<Branch>> {
        self.items.items()
    }

    /// Merge-refresh from branch records.
    pub fn merge_records(&self, records: Vec<BranchData>) -> MergeSummary {
        self.items.merge(
            records,
            |data| data.name.clone(),
            |branch, data| {
                branch.update(data);
            },
            |data| Branch::from_data(&self.context, data),
        )
    }

    pub fn refresh(&self) -> Result<MergeSummary> {
        let records = self
            .context
            .accessor()
            .query_branches(&QueryBranchesParameters::new(
                BranchRestriction::Local,
                BranchQueryMode::Default,
            ))?;
        Ok(self.merge_records(records))
    }

    /// Re-query one branch; removes it from the cache if it is gone.
    pub fn refresh_one(&self, name: &str) -> Result<Option<Arc<Branch>>> {
        match self.context.accessor().query_branch(name, false)? {
            Some(data) => Ok(Some(self.merge_one(data))),
            None => {
                self.items.remove(name);
                Ok(None)
            }
        }
    }

    fn merge_one(&self, data: BranchData) -> Arc<Branch> {
        let name = data.name.clone();
        self.items.merge_item(
            &name,
            data,
            |branch, data| {
                branch.update(data);
            },
            |data| Branch::from_data(&self.context, data),
        )
    }

    /// Create a branch at `starting_revision` (hash or reference name).
    pub fn create(&self, name: &str, starting_revision: &str) -> Result<Arc<Branch>> {
        validate_branch_name(name)?;
        let _scope = self.context.gate().suppress(ChangeCategories::BRANCHES);
        self.context.accessor().create_branch(&CreateBranchParameters {
            name: name.to_string(),
            starting_revision: starting_revision.to_string(),
            checkout: false,
        })?;
        let data = self
            .context
            .accessor()
            .query_branch(name, false)?
            .ok_or_else(|| AccessorError::BranchNotFound {
                name: name.to_string(),
            })?;
        info!(name, "branch created");
        Ok(self.merge_one(data))
    }

    /// Rename a branch, keeping the cached instance.
    pub fn rename(&self, branch: &Branch, new_name: &str) -> Result<()> {
        let old_name = branch.name();
        branch.lifetime().ensure_alive(&old_name)?;
        validate_branch_name(new_name)?;
        let _scope = self
            .context
            .gate()
            .suppress(ChangeCategories::BRANCHES | ChangeCategories::HEAD);
        self.context.accessor().rename_branch(&old_name, new_name)?;
        self.items.rename(&old_name, new_name)?;
        info!(old = %old_name, new = new_name, "branch renamed");
        Ok(())
    }

    /// Delete a branch. Without `force`, the external tool refuses to drop
    /// unmerged work.
    pub fn delete(&self, branch: &Branch, force: bool) -> Result<()> {
        let name = branch.name();
        branch.lifetime().ensure_alive(&name)?;
        let _scope = self.context.gate().suppress(ChangeCategories::BRANCHES);
        self.context
            .accessor()
            .delete_branch(&DeleteBranchParameters {
                name: name.clone(),
                remote: false,
                force,
            })?;
        self.items.remove(&name);
        info!(name = %name, force, "branch deleted");
        Ok(())
    }

    /// Move a branch that is not checked out to `target`.
    pub fn reset(&self, branch: &Branch, target: &Revision) -> Result<()> {
        let name = branch.name();
        branch.lifetime().ensure_alive(&name)?;
        let _scope = self.context.gate().suppress(ChangeCategories::BRANCHES);
        self.context
            .accessor()
            .reset_branch(&name, &target.hash())?;
        let revision = self.context.revisions().get_or_create_revision(target.hash());
        branch.set_revision(revision);
        debug!(name = %name, target = %target.hash().short_hex(), "branch reset");
        Ok(())
    }

    /// Local branches whose tip is not reachable from `HEAD`.
    pub fn get_unmerged_branches(&self) -> Result<Vec<Arc<Branch>>> {
        let head = match self.context.accessor().dereference("HEAD") {
            Ok(data) => data.hash,
            Err(AccessorError::UnknownRevision { .. }) => return Ok(self.all()),
            Err(err) => return Err(err.into()),
        };
        let records = self
            .context
            .accessor()
            .query_branches(&QueryBranchesParameters::new(
                BranchRestriction::Local,
                BranchQueryMode::Unmerged(head),
            ))?;
        Ok(records
            .iter()
            .filter_map(|data| self.items.try_get_item(&data.name))
            .collect())
    }
}
