//! `HEAD`: the current branch, or a detached commit.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use replica_accessor::{HeadData, MergeParameters, ResetMode, ResetParameters};
use replica_events::ChangeCategories;
use replica_types::{ReferenceKey, ReferenceType};

use crate::branch::{Branch, Branches, PositionFollower};
use crate::context::RefsContext;
use crate::error::{RefError, Result};
use crate::pointer::Pointer;
use crate::reference::{PointerUpdate, Reference, ReferenceCore};

/// The `HEAD` reference.
///
/// While attached, `HEAD` follows its branch: a move of the branch moves
/// `HEAD` and fires its `PositionChanged`. Nothing flows the other way.
pub struct Head {
    core: ReferenceCore,
    branches: Arc<Branches>,
    this: Weak<Head>,
}

impl Head {
    /// Create an unloaded `HEAD`. Call [`refresh`](Head::refresh) to load it.
    pub fn new(context: &Arc<RefsContext>, branches: Arc<Branches>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            core: ReferenceCore::new(
                context,
                ReferenceKey::new(ReferenceType::Head, "HEAD"),
                Pointer::Unborn(String::new()),
            ),
            branches,
            this: this.clone(),
        })
    }

    fn as_follower(&self) -> Weak<dyn PositionFollower> {
        self.this.clone()
    }

    pub(crate) fn set_pointer(&self, pointer: Pointer) -> PointerUpdate {
        let old = self.core.pointer();
        if !old.same_as(&pointer) {
            if let Pointer::Branch(branch) = &old {
                branch.remove_follower(&self.as_follower());
            }
            if let Pointer::Branch(branch) = &pointer {
                branch.add_follower(self.as_follower());
            }
        }
        self.core.set_pointer(pointer)
    }

    /// Point at what the repository reports. No external call.
    pub fn apply(&self, data: HeadData) -> PointerUpdate {
        let pointer = match data {
            HeadData::Attached { branch } => match self.branches.try_get_item(&branch) {
                Some(branch) => Pointer::Branch(branch),
                None => Pointer::Unborn(branch),
            },
            HeadData::Detached { hash } => {
                Pointer::Revision(self.core.context().revisions().get_or_create_revision(hash))
            }
        };
        self.set_pointer(pointer)
    }

    pub fn refresh(&self) -> Result<PointerUpdate> {
        let data = self.core.context().accessor().query_head()?;
        Ok(self.apply(data))
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.core.pointer(), Pointer::Revision(_))
    }

    /// `true` when `HEAD` resolves to no commit (empty repository).
    pub fn is_empty(&self) -> bool {
        self.core.revision().is_none()
    }

    /// The branch `HEAD` is attached to, if it exists.
    pub fn current_branch(&self) -> Option<Arc<Branch>> {
        match self.core.pointer() {
            Pointer::Branch(branch) => Some(branch),
            _ => None,
        }
    }

    /// Reset `HEAD` (and its branch) to `target`, a hash or reference name.
    pub fn reset(&self, target: &str, mode: ResetMode) -> Result<()> {
        if target.trim().is_empty() {
            return Err(RefError::InvalidArgument {
                message: "reset target must not be empty".into(),
            });
        }
        let _scope = self
            .core
            .context()
            .gate()
            .suppress(ChangeCategories::HEAD | ChangeCategories::BRANCHES);
        self.core.context().accessor().reset(&ResetParameters {
            revision: target.to_string(),
            mode,
        })?;
        self.sync()?;
        info!(revision = target, ?mode, "head reset");
        Ok(())
    }

    /// Merge revisions into `HEAD`.
    pub fn merge(&self, parameters: &MergeParameters) -> Result<()> {
        if parameters.revisions.is_empty() {
            return Err(RefError::InvalidArgument {
                message: "nothing to merge".into(),
            });
        }
        if self.is_empty() {
            return Err(RefError::invalid_state(
                "cannot merge into an empty repository",
            ));
        }
        let _scope = self
            .core
            .context()
            .gate()
            .suppress(ChangeCategories::HEAD | ChangeCategories::BRANCHES);
        self.core.context().accessor().merge(parameters)?;
        self.sync()?;
        info!(revisions = parameters.revisions.len(), "merged into head");
        Ok(())
    }

    /// Re-read `HEAD` and the branch it names after a local move.
    fn sync(&self) -> Result<()> {
        let data = self.core.context().accessor().query_head()?;
        if let HeadData::Attached { branch } = &data {
            self.branches.refresh_one(branch)?;
        }
        self.apply(data);
        Ok(())
    }
}

impl PositionFollower for Head {
    fn branch_moved(&self, branch: &Branch) {
        if self.core.refresh_position() {
            debug!(branch = %branch.core().full_name(), "head followed branch");
        }
    }
}

impl Reference for Head {
    fn core(&self) -> &ReferenceCore {
        &self.core
    }
}

impl fmt::Debug for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt(f)
    }
}
