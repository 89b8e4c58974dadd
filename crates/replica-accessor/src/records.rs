//! Data records returned by accessor queries.
//!
//! Records are plain data: they carry what the external tool reported at the
//! moment of the query and nothing else. The cache layers reconcile them
//! against long-lived objects.

use serde::{Deserialize, Serialize};

use replica_types::{Hash, Signature};

/// A commit as reported by a revision or history query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionData {
    pub hash: Hash,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tree_hash: Option<Hash>,
    /// Parent hashes in order (first parent first).
    #[serde(default)]
    pub parents: Vec<Hash>,
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub committer: Option<Signature>,
}

impl RevisionData {
    /// A record carrying only a hash and a subject line.
    pub fn new(hash: Hash, subject: impl Into<String>) -> Self {
        Self {
            hash,
            subject: subject.into(),
            body: String::new(),
            tree_hash: None,
            parents: Vec::new(),
            author: None,
            committer: None,
        }
    }

    pub fn with_parents(mut self, parents: Vec<Hash>) -> Self {
        self.parents = parents;
        self
    }
}

/// A local or remote branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchData {
    /// Short name: `main` for a local branch, `origin/main` for a remote one.
    pub name: String,
    pub target: Hash,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub is_current: bool,
    /// Short name of the upstream branch, if tracking is configured.
    #[serde(default)]
    pub upstream: Option<String>,
}

impl BranchData {
    pub fn local(name: impl Into<String>, target: Hash) -> Self {
        Self {
            name: name.into(),
            target,
            is_remote: false,
            is_current: false,
            upstream: None,
        }
    }

    pub fn remote(name: impl Into<String>, target: Hash) -> Self {
        Self {
            is_remote: true,
            ..Self::local(name, target)
        }
    }
}

/// Whether a tag is a bare pointer or a tag object with a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagKind {
    #[default]
    Lightweight,
    Annotated,
}

/// A tag, with its target already peeled to a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    pub name: String,
    pub target: Hash,
    #[serde(default)]
    pub kind: TagKind,
    #[serde(default)]
    pub message: Option<String>,
}

impl TagData {
    pub fn lightweight(name: impl Into<String>, target: Hash) -> Self {
        Self {
            name: name.into(),
            target,
            kind: TagKind::Lightweight,
            message: None,
        }
    }
}

/// Result of a combined references query.
///
/// A list is `None` when its kind was not requested, which is different from
/// `Some(vec![])` (requested, none exist).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesData {
    pub heads: Option<Vec<BranchData>>,
    pub remotes: Option<Vec<BranchData>>,
    pub tags: Option<Vec<TagData>>,
    /// Target of `refs/stash`, if the stash was requested and exists.
    pub stash: Option<Hash>,
}

/// One entry of a reference's reflog. Queries return records newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflogRecordData {
    pub message: String,
    pub revision: RevisionData,
}

/// What `HEAD` points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeadData {
    /// Symbolic: `HEAD` names a local branch (which may not exist yet).
    Attached { branch: String },
    /// Detached: `HEAD` holds a commit hash directly.
    Detached { hash: Hash },
}

/// Where a configuration value was read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    System,
    User,
    #[default]
    Repository,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParameterData {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub source: ConfigSource,
}

/// One stash entry; `index` 0 is the newest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashedStateData {
    pub index: usize,
    pub revision: RevisionData,
}

/// A note attached to an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteData {
    pub object: Hash,
    pub message: String,
}

/// A configured remote repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteData {
    pub name: String,
    pub fetch_url: String,
    #[serde(default)]
    pub push_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleData {
    pub name: String,
    pub path: String,
    pub url: String,
}

/// A contributor and the number of commits attributed to them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub commits: u32,
}

/// Working tree summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusData {
    pub staged_added: u32,
    pub staged_modified: u32,
    pub staged_removed: u32,
    pub unstaged_untracked: u32,
    pub unstaged_modified: u32,
    pub unstaged_removed: u32,
    pub unmerged: u32,
}

impl StatusData {
    pub fn staged(&self) -> u32 {
        self.staged_added + self.staged_modified + self.staged_removed
    }

    pub fn unstaged(&self) -> u32 {
        self.unstaged_untracked + self.unstaged_modified + self.unstaged_removed
    }

    /// Returns `true` if there is nothing staged, unstaged or unmerged.
    pub fn is_clean(&self) -> bool {
        self.staged() == 0 && self.unstaged() == 0 && self.unmerged == 0
    }
}

/// Operation in progress in the repository, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepositoryStateData {
    #[default]
    Clean,
    Merging,
    Rebasing,
    CherryPicking,
    Reverting,
    Bisecting,
}
