//! The [`RepositoryAccessor`] trait: every round-trip replica makes to the
//! external repository.

use replica_types::{Hash, ReferenceTypes};

use crate::error::Result;
use crate::params::{
    BranchRestriction, CreateBranchParameters, CreateTagParameters, DeleteBranchParameters,
    FetchParameters, MergeParameters, PullParameters, QueryBranchesParameters,
    QueryRevisionsParameters, ResetParameters,
};
use crate::records::{
    BranchData, ConfigParameterData, HeadData, NoteData, ReferencesData, ReflogRecordData,
    RemoteData, RepositoryStateData, RevisionData, StashedStateData, StatusData, SubmoduleData,
    TagData, UserData,
};

/// Query and command interface of the external repository.
///
/// Every method is one blocking round-trip. Implementations must be
/// thread-safe (`Send + Sync`); callers never hold an internal cache lock
/// while a method runs. Asynchronous callers run these on a blocking pool.
///
/// Mutations only report success or failure. Callers re-query whatever state
/// they need afterwards, so the cache is only ever updated from data the
/// external tool reported.
pub trait RepositoryAccessor: Send + Sync {
    // ---- Queries ----

    fn query_config(&self) -> Result<Vec<ConfigParameterData>>;

    /// Query references of the requested kinds in one round-trip.
    fn query_references(&self, types: ReferenceTypes) -> Result<ReferencesData>;

    fn query_branches(
        &self,
        parameters: &QueryBranchesParameters,
    ) -> Result<Vec<BranchData>>;

    /// Query a single branch by short name. Returns `Ok(None)` if it does not
    /// exist.
    fn query_branch(&self, name: &str, remote: bool) -> Result<Option<BranchData>> {
        let restriction = if remote {
            BranchRestriction::Remote
        } else {
            BranchRestriction::Local
        };
        let parameters = QueryBranchesParameters {
            restriction,
            ..Default::default()
        };
        Ok(self
            .query_branches(&parameters)?
            .into_iter()
            .find(|b| b.name == name))
    }

    fn query_tags(&self) -> Result<Vec<TagData>>;

    /// Query a single tag by name. Returns `Ok(None)` if it does not exist.
    fn query_tag(&self, name: &str) -> Result<Option<TagData>> {
        Ok(self.query_tags()?.into_iter().find(|t| t.name == name))
    }

    /// Query one commit. Fails with
    /// [`AccessorError::UnknownRevision`](crate::AccessorError::UnknownRevision)
    /// if it does not exist.
    fn query_revision(&self, hash: &Hash) -> Result<RevisionData>;

    /// History query, newest first.
    fn query_revisions(
        &self,
        parameters: &QueryRevisionsParameters,
    ) -> Result<Vec<RevisionData>>;

    /// Resolve an expression (hash, reference name, ...) to a commit.
    fn dereference(&self, expression: &str) -> Result<RevisionData>;

    /// Reflog of a reference (by full name), newest first.
    fn query_reflog(&self, reference: &str) -> Result<Vec<ReflogRecordData>>;

    fn query_head(&self) -> Result<HeadData>;

    fn query_stash(&self) -> Result<Vec<StashedStateData>>;

    fn query_notes(&self) -> Result<Vec<NoteData>>;

    fn query_remotes(&self) -> Result<Vec<RemoteData>>;

    fn query_submodules(&self) -> Result<Vec<SubmoduleData>>;

    fn query_users(&self) -> Result<Vec<UserData>>;

    fn query_status(&self) -> Result<StatusData>;

    fn query_repository_state(&self) -> Result<RepositoryStateData>;

    // ---- Mutations ----

    fn create_branch(&self, parameters: &CreateBranchParameters) -> Result<()>;

    fn rename_branch(&self, old_name: &str, new_name: &str) -> Result<()>;

    fn delete_branch(&self, parameters: &DeleteBranchParameters) -> Result<()>;

    /// Move a local branch that is not checked out to `target`.
    fn reset_branch(&self, name: &str, target: &Hash) -> Result<()>;

    fn create_tag(&self, parameters: &CreateTagParameters) -> Result<()>;

    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Reset `HEAD` (and the branch it is attached to) to a revision.
    fn reset(&self, parameters: &ResetParameters) -> Result<()>;

    fn merge(&self, parameters: &MergeParameters) -> Result<()>;

    fn fetch(&self, parameters: &FetchParameters) -> Result<()>;

    fn pull(&self, parameters: &PullParameters) -> Result<()>;

    /// Delete remote branches that no longer exist on `remote`.
    fn prune(&self, remote: &str) -> Result<()>;
}
