//! State and events shared by every reference kind.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use replica_cache::Lifetime;
use replica_events::{EventChannel, EventStream};
use replica_revisions::Revision;
use replica_types::{ReferenceKey, ReferenceType};

use crate::context::RefsContext;
use crate::pointer::Pointer;
use crate::reflog::Reflog;

/// The raw pointer of a reference was replaced by a different object.
#[derive(Clone, Debug)]
pub struct PointerChanged {
    pub old: Pointer,
    pub new: Pointer,
}

/// The revision a reference resolves to changed.
#[derive(Clone, Debug)]
pub struct PositionChanged {
    pub old: Option<Arc<Revision>>,
    pub new: Option<Arc<Revision>>,
}

/// A reference was renamed (short names).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Renamed {
    pub old_name: String,
    pub new_name: String,
}

/// What a pointer assignment changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerUpdate {
    pub pointer_changed: bool,
    pub position_changed: bool,
}

struct Target {
    pointer: Pointer,
    revision: Option<Arc<Revision>>,
}

fn same_revision(a: &Option<Arc<Revision>>, b: &Option<Arc<Revision>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.hash() == b.hash(),
        (None, None) => true,
        _ => false,
    }
}

/// Name, lifetime, target and events of one reference.
///
/// The resolved revision is cached next to the pointer so that a change of
/// either can be detected independently: replacing the pointer fires
/// [`PointerChanged`], moving to another commit fires [`PositionChanged`],
/// and only the latter touches the revision's reference set.
pub struct ReferenceCore {
    key: RwLock<ReferenceKey>,
    lifetime: Lifetime,
    context: Arc<RefsContext>,
    target: RwLock<Target>,
    reflog: OnceLock<Arc<Reflog>>,
    pointer_changed: EventChannel<PointerChanged>,
    position_changed: EventChannel<PositionChanged>,
    renamed: EventChannel<Renamed>,
}

impl ReferenceCore {
    pub(crate) fn new(context: &Arc<RefsContext>, key: ReferenceKey, pointer: Pointer) -> Self {
        let revision = pointer.dereference();
        if let Some(revision) = &revision {
            context.links().attach(&key, &revision.hash());
        }
        let capacity = context.capacity();
        Self {
            key: RwLock::new(key),
            lifetime: Lifetime::with_capacity(capacity),
            context: Arc::clone(context),
            target: RwLock::new(Target { pointer, revision }),
            reflog: OnceLock::new(),
            pointer_changed: EventChannel::with_capacity(capacity),
            position_changed: EventChannel::with_capacity(capacity),
            renamed: EventChannel::with_capacity(capacity),
        }
    }

    fn key_guard(&self) -> RwLockReadGuard<'_, ReferenceKey> {
        self.key.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn target_guard(&self) -> RwLockReadGuard<'_, Target> {
        self.target.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> ReferenceKey {
        self.key_guard().clone()
    }

    pub fn full_name(&self) -> String {
        self.key_guard().full_name.clone()
    }

    pub fn short_name(&self) -> String {
        self.key_guard().short_name().to_string()
    }

    pub fn reference_type(&self) -> ReferenceType {
        self.key_guard().reference_type
    }

    pub fn context(&self) -> &Arc<RefsContext> {
        &self.context
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn pointer(&self) -> Pointer {
        self.target_guard().pointer.clone()
    }

    pub fn revision(&self) -> Option<Arc<Revision>> {
        self.target_guard().revision.clone()
    }

    /// The reflog, created empty and stale on first access.
    pub fn reflog(&self) -> Arc<Reflog> {
        Arc::clone(
            self.reflog
                .get_or_init(|| Arc::new(Reflog::new(&self.context, self.full_name()))),
        )
    }

    pub fn subscribe_pointer_changed(&self) -> EventStream<PointerChanged> {
        self.pointer_changed.subscribe()
    }

    pub fn subscribe_position_changed(&self) -> EventStream<PositionChanged> {
        self.position_changed.subscribe()
    }

    pub fn subscribe_renamed(&self) -> EventStream<Renamed> {
        self.renamed.subscribe()
    }

    /// Replace the pointer.
    ///
    /// The revision back-set is only touched when the resolved revision
    /// differs. `PointerChanged` fires when the pointer object differs even
    /// if it resolves to the same commit; `PositionChanged` fires only when
    /// the commit differs.
    pub(crate) fn set_pointer(&self, pointer: Pointer) -> PointerUpdate {
        let new_revision = pointer.dereference();
        let (old_pointer, old_revision, update) = {
            let mut target = self.target.write().unwrap_or_else(PoisonError::into_inner);
            let update = PointerUpdate {
                pointer_changed: !target.pointer.same_as(&pointer),
                position_changed: !same_revision(&target.revision, &new_revision),
            };
            if !update.pointer_changed && !update.position_changed {
                return update;
            }
            let old_pointer = std::mem::replace(&mut target.pointer, pointer.clone());
            let old_revision = if update.position_changed {
                std::mem::replace(&mut target.revision, new_revision.clone())
            } else {
                target.revision.clone()
            };
            (old_pointer, old_revision, update)
        };

        if update.position_changed {
            self.relink(&old_revision, &new_revision);
        }
        if update.pointer_changed {
            self.pointer_changed.emit(PointerChanged {
                old: old_pointer,
                new: pointer,
            });
        }
        if update.position_changed {
            debug!(
                reference = %self.full_name(),
                old = ?old_revision.as_ref().map(|r| r.hash().short_hex()),
                new = ?new_revision.as_ref().map(|r| r.hash().short_hex()),
                "reference moved"
            );
            self.position_changed.emit(PositionChanged {
                old: old_revision,
                new: new_revision,
            });
        }
        update
    }

    /// Re-resolve the current pointer, e.g. after the branch it names moved.
    /// Returns `true` if the position changed.
    pub(crate) fn refresh_position(&self) -> bool {
        let pointer = self.pointer();
        self.set_pointer(pointer).position_changed
    }

    fn relink(&self, old: &Option<Arc<Revision>>, new: &Option<Arc<Revision>>) {
        if let Some(reflog) = self.reflog.get() {
            reflog.mark_stale();
        }
        if self.lifetime.is_deleted() {
            return;
        }
        let key = self.key();
        let links = self.context.links();
        if let Some(old) = old {
            links.detach(&key, &old.hash());
        }
        if let Some(new) = new {
            links.attach(&key, &new.hash());
        }
    }

    /// Change the short name, keeping the kind.
    pub(crate) fn rename(&self, new_short_name: &str) {
        let (old_key, new_key) = {
            let mut key = self.key.write().unwrap_or_else(PoisonError::into_inner);
            let new_key = ReferenceKey::from_short_name(key.reference_type, new_short_name);
            (std::mem::replace(&mut *key, new_key.clone()), new_key)
        };
        if !self.lifetime.is_deleted() {
            if let Some(revision) = self.revision() {
                self.context
                    .links()
                    .rekey(&old_key, &new_key, &revision.hash());
            }
        }
        if let Some(reflog) = self.reflog.get() {
            reflog.set_reference(new_key.full_name.clone());
        }
        self.renamed.emit(Renamed {
            old_name: old_key.short_name().to_string(),
            new_name: new_key.short_name().to_string(),
        });
    }

    /// Drop this reference from its revision's reference set.
    pub(crate) fn unlink(&self) {
        if let Some(revision) = self.revision() {
            self.context.links().detach(&self.key(), &revision.hash());
        }
    }

    /// Restore this reference in its revision's reference set.
    pub(crate) fn link(&self) {
        if let Some(revision) = self.revision() {
            self.context.links().attach(&self.key(), &revision.hash());
        }
    }
}

impl fmt::Debug for ReferenceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target_guard();
        f.debug_struct("Reference")
            .field("name", &self.full_name())
            .field("pointer", &target.pointer)
            .field("deleted", &self.lifetime.is_deleted())
            .finish()
    }
}

/// Common surface of [`Branch`](crate::Branch),
/// [`RemoteBranch`](crate::RemoteBranch), [`Tag`](crate::Tag) and
/// [`Head`](crate::Head).
pub trait Reference: Send + Sync {
    fn core(&self) -> &ReferenceCore;

    fn key(&self) -> ReferenceKey {
        self.core().key()
    }

    fn short_name(&self) -> String {
        self.core().short_name()
    }

    fn reference_type(&self) -> ReferenceType {
        self.core().reference_type()
    }

    /// The commit this reference currently resolves to.
    fn revision(&self) -> Option<Arc<Revision>> {
        self.core().revision()
    }

    fn reflog(&self) -> Arc<Reflog> {
        self.core().reflog()
    }

    fn subscribe_pointer_changed(&self) -> EventStream<PointerChanged> {
        self.core().subscribe_pointer_changed()
    }

    fn subscribe_position_changed(&self) -> EventStream<PositionChanged> {
        self.core().subscribe_position_changed()
    }

    fn subscribe_renamed(&self) -> EventStream<Renamed> {
        self.core().subscribe_renamed()
    }
}
