//! Reference cache for replica.
//!
//! Mirrors the references of an external repository as identity-stable
//! objects. Every object is created once per name and updated in place on
//! refresh, so subscribers and holders of an `Arc` see the same instance for
//! as long as the reference exists (and again if it reappears).
//!
//! # Architecture
//!
//! - **Branches** are local branch tips. A branch that moves notifies its
//!   followers, which is how `HEAD` tracks the branch it is attached to.
//! - **Remote branches** mirror `refs/remotes/<remote>/<branch>` and are only
//!   changed by fetch, pull and prune.
//! - **Tags** point at a commit and carry an optional annotation.
//! - **HEAD** points at a branch (attached), a commit (detached) or a branch
//!   that does not exist yet (unborn). Changes only ever flow from branch to
//!   `HEAD`, never back.
//! - Every reference keeps its revision's reference set current, through
//!   [`ReferenceLinks`](replica_revisions::ReferenceLinks).
//!
//! # Modules
//!
//! - [`names`] — Reference name validation
//! - [`pointer`] — [`Pointer`], the target of a reference
//! - [`reference`] — [`ReferenceCore`] and the [`Reference`] trait
//! - [`reflog`] — Lazily loaded per-reference [`Reflog`]
//! - [`branch`], [`remote_branch`], [`tag`], [`head`] — The reference kinds
//! - [`refs`] — [`RefsCollection`], all kinds refreshed with one query
//! - [`error`] — [`RefError`]

pub mod branch;
pub mod context;
pub mod error;
pub mod head;
pub mod names;
pub mod pointer;
pub mod reference;
pub mod reflog;
pub mod refs;
pub mod remote_branch;
pub mod tag;

pub use branch::{Branch, Branches, PositionFollower};
pub use context::RefsContext;
pub use error::{RefError, Result};
pub use head::Head;
pub use names::{
    validate_branch_name, validate_reference_name, validate_remote_branch_name,
    validate_remote_name, validate_tag_name,
};
pub use pointer::{Pointer, RevisionPointer};
pub use reference::{
    PointerChanged, PointerUpdate, PositionChanged, Reference, ReferenceCore, Renamed,
};
pub use reflog::{Reflog, ReflogEvent, ReflogRecord};
pub use refs::{ContainingBranches, RefreshOutcome, RefsCollection};
pub use remote_branch::{RemoteBranch, RemoteBranches};
pub use tag::{Tag, Tags};
