//! Parameters for accessor queries and mutations.

use serde::{Deserialize, Serialize};

use replica_types::Hash;

/// Which branches a branch query lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchRestriction {
    #[default]
    All,
    Local,
    Remote,
}

/// Filter applied by a branch query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchQueryMode {
    #[default]
    Default,
    /// Branches whose tip is reachable from the given revision.
    Merged(Hash),
    /// Branches whose tip is not reachable from the given revision.
    Unmerged(Hash),
    /// Branches whose history contains the given revision.
    Contains(Hash),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBranchesParameters {
    pub restriction: BranchRestriction,
    pub mode: BranchQueryMode,
}

impl QueryBranchesParameters {
    pub fn new(restriction: BranchRestriction, mode: BranchQueryMode) -> Self {
        Self { restriction, mode }
    }
}

/// History query: commits reachable from `references`, newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRevisionsParameters {
    /// Starting points (hashes or reference names). Empty means `HEAD`.
    pub references: Vec<String>,
    pub max_count: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBranchParameters {
    pub name: String,
    /// Starting point: a hash or a reference name.
    pub starting_revision: String,
    pub checkout: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBranchParameters {
    pub name: String,
    pub remote: bool,
    pub force: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTagParameters {
    pub name: String,
    pub target: String,
    /// `Some` creates an annotated tag.
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetMode {
    Soft,
    #[default]
    Mixed,
    Hard,
    Merge,
    Keep,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetParameters {
    pub revision: String,
    pub mode: ResetMode,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParameters {
    /// Revisions (hashes or reference names) merged into `HEAD`.
    pub revisions: Vec<String>,
    pub no_fast_forward: bool,
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParameters {
    /// Remote to fetch from; `None` fetches all remotes.
    pub remote: Option<String>,
    pub prune: bool,
    pub tags: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullParameters {
    pub remote: Option<String>,
    /// Remote branch merged into the current branch; defaults to its upstream.
    pub branch: Option<String>,
}
