use std::fmt;
use std::sync::Arc;

use replica_revisions::Revision;

use crate::branch::Branch;
use crate::reference::Reference;
use crate::remote_branch::RemoteBranch;
use crate::tag::Tag;

/// What a reference points at.
///
/// Branches, remote branches and tags point at a revision. `HEAD` points at
/// a branch when attached, at a revision when detached, and at a branch that
/// does not exist yet in an empty repository.
#[derive(Clone)]
pub enum Pointer {
    Revision(Arc<Revision>),
    Branch(Arc<Branch>),
    RemoteBranch(Arc<RemoteBranch>),
    Tag(Arc<Tag>),
    /// Local branch named by `HEAD` that has no commit yet.
    Unborn(String),
}

impl Pointer {
    /// Resolve to a concrete revision, following references.
    pub fn dereference(&self) -> Option<Arc<Revision>> {
        match self {
            Self::Revision(revision) => Some(Arc::clone(revision)),
            Self::Branch(branch) => branch.revision(),
            Self::RemoteBranch(branch) => branch.revision(),
            Self::Tag(tag) => tag.revision(),
            Self::Unborn(_) => None,
        }
    }

    /// Full reference name, or the commit hash for a revision pointer.
    pub fn full_name(&self) -> String {
        match self {
            Self::Revision(revision) => revision.hash().to_hex(),
            Self::Branch(branch) => branch.full_name(),
            Self::RemoteBranch(branch) => branch.full_name(),
            Self::Tag(tag) => tag.full_name(),
            Self::Unborn(name) => format!("refs/heads/{name}"),
        }
    }

    /// Identity comparison: the same object, or the same unborn name.
    pub fn same_as(&self, other: &Pointer) -> bool {
        match (self, other) {
            (Self::Revision(a), Self::Revision(b)) => Arc::ptr_eq(a, b),
            (Self::Branch(a), Self::Branch(b)) => Arc::ptr_eq(a, b),
            (Self::RemoteBranch(a), Self::RemoteBranch(b)) => Arc::ptr_eq(a, b),
            (Self::Tag(a), Self::Tag(b)) => Arc::ptr_eq(a, b),
            (Self::Unborn(a), Self::Unborn(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revision(revision) => write!(f, "Revision({})", revision.hash().short_hex()),
            Self::Unborn(name) => write!(f, "Unborn({name})"),
            other => write!(f, "Reference({})", other.full_name()),
        }
    }
}

/// Anything that resolves to a commit: references and raw pointers alike.
pub trait RevisionPointer {
    fn pointer(&self) -> Pointer;

    fn full_name(&self) -> String;

    fn dereference(&self) -> Option<Arc<Revision>>;
}

impl RevisionPointer for Pointer {
    fn pointer(&self) -> Pointer {
        self.clone()
    }

    fn full_name(&self) -> String {
        Pointer::full_name(self)
    }

    fn dereference(&self) -> Option<Arc<Revision>> {
        Pointer::dereference(self)
    }
}

impl<T: Reference + ?Sized> RevisionPointer for T {
    fn pointer(&self) -> Pointer {
        self.core().pointer()
    }

    fn full_name(&self) -> String {
        self.core().full_name()
    }

    fn dereference(&self) -> Option<Arc<Revision>> {
        self.core().revision()
    }
}
