//! Reference kinds and naming.
//!
//! The external repository namespaces its references by prefix:
//!
//! - `refs/heads/*` for local branches
//! - `refs/remotes/{remote}/*` for remote tracking branches
//! - `refs/tags/*` for tags
//! - `refs/stash` for the stash
//! - `HEAD` for the symbolic head reference

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub const LOCAL_BRANCH_PREFIX: &str = "refs/heads/";
pub const REMOTE_BRANCH_PREFIX: &str = "refs/remotes/";
pub const TAG_PREFIX: &str = "refs/tags/";
pub const STASH_NAME: &str = "refs/stash";
pub const HEAD_NAME: &str = "HEAD";

/// Kind of a named reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReferenceType {
    LocalBranch,
    RemoteBranch,
    Tag,
    Stash,
    Head,
}

impl ReferenceType {
    /// The full-name prefix for this kind (`HEAD` and the stash have fixed names).
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::LocalBranch => LOCAL_BRANCH_PREFIX,
            Self::RemoteBranch => REMOTE_BRANCH_PREFIX,
            Self::Tag => TAG_PREFIX,
            Self::Stash => STASH_NAME,
            Self::Head => HEAD_NAME,
        }
    }

    /// Build the full name of a reference of this kind from its short name.
    ///
    /// For [`ReferenceType::Stash`] and [`ReferenceType::Head`] the short name
    /// is ignored.
    pub fn full_name(&self, short_name: &str) -> String {
        match self {
            Self::LocalBranch | Self::RemoteBranch | Self::Tag => {
                format!("{}{short_name}", self.prefix())
            }
            Self::Stash => STASH_NAME.to_string(),
            Self::Head => HEAD_NAME.to_string(),
        }
    }

    /// Classify a full reference name, returning its kind and short name.
    pub fn classify(full_name: &str) -> Result<(Self, &str), TypeError> {
        if full_name == HEAD_NAME {
            return Ok((Self::Head, HEAD_NAME));
        }
        if full_name == STASH_NAME {
            return Ok((Self::Stash, "stash"));
        }
        for kind in [Self::LocalBranch, Self::RemoteBranch, Self::Tag] {
            if let Some(short) = full_name.strip_prefix(kind.prefix()) {
                if !short.is_empty() {
                    return Ok((kind, short));
                }
            }
        }
        Err(TypeError::InvalidReferenceName(full_name.to_string()))
    }

    /// The single-bit mask selecting this kind.
    pub fn mask(&self) -> ReferenceTypes {
        match self {
            Self::LocalBranch => ReferenceTypes::LOCAL_BRANCHES,
            Self::RemoteBranch => ReferenceTypes::REMOTE_BRANCHES,
            Self::Tag => ReferenceTypes::TAGS,
            Self::Stash => ReferenceTypes::STASH,
            Self::Head => ReferenceTypes::empty(),
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocalBranch => "branch",
            Self::RemoteBranch => "remote branch",
            Self::Tag => "tag",
            Self::Stash => "stash",
            Self::Head => "HEAD",
        };
        write!(f, "{s}")
    }
}

bitflags! {
    /// Subset of reference kinds, used to scope queries, refreshes and
    /// snapshots.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ReferenceTypes: u8 {
        const LOCAL_BRANCHES = 0b0001;
        const REMOTE_BRANCHES = 0b0010;
        const TAGS = 0b0100;
        const STASH = 0b1000;
        const BRANCHES = Self::LOCAL_BRANCHES.bits() | Self::REMOTE_BRANCHES.bits();
        const REFERENCES = Self::BRANCHES.bits() | Self::TAGS.bits();
        const ALL = Self::REFERENCES.bits() | Self::STASH.bits();
    }
}

impl ReferenceTypes {
    /// Returns `true` if `kind` is selected by this mask.
    pub fn includes(&self, kind: ReferenceType) -> bool {
        let mask = kind.mask();
        !mask.is_empty() && self.contains(mask)
    }
}

impl From<ReferenceType> for ReferenceTypes {
    fn from(kind: ReferenceType) -> Self {
        kind.mask()
    }
}

/// Identity of a reference independent of any cached object: its kind and
/// full name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceKey {
    pub reference_type: ReferenceType,
    pub full_name: String,
}

impl ReferenceKey {
    pub fn new(reference_type: ReferenceType, full_name: impl Into<String>) -> Self {
        Self {
            reference_type,
            full_name: full_name.into(),
        }
    }

    /// Build a key from a kind and short name.
    pub fn from_short_name(reference_type: ReferenceType, short_name: &str) -> Self {
        Self::new(reference_type, reference_type.full_name(short_name))
    }

    /// Parse a full name into a key.
    pub fn parse(full_name: &str) -> Result<Self, TypeError> {
        let (reference_type, _) = ReferenceType::classify(full_name)?;
        Ok(Self::new(reference_type, full_name))
    }

    /// The name with the kind's prefix removed (e.g. `main`, `origin/main`).
    pub fn short_name(&self) -> &str {
        match self.reference_type {
            ReferenceType::LocalBranch | ReferenceType::RemoteBranch | ReferenceType::Tag => self
                .full_name
                .strip_prefix(self.reference_type.prefix())
                .unwrap_or(&self.full_name),
            ReferenceType::Stash => "stash",
            ReferenceType::Head => HEAD_NAME,
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

/// Split a remote branch short name (`origin/feature/x`) into the remote name
/// and the branch name on that remote.
pub fn split_remote_branch_name(name: &str) -> Option<(&str, &str)> {
    let (remote, branch) = name.split_once('/')?;
    if remote.is_empty() || branch.is_empty() {
        return None;
    }
    Some((remote, branch))
}
