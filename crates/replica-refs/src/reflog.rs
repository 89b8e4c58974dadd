//! Per-reference history of pointer changes.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use replica_events::{EventChannel, EventStream};
use replica_revisions::Revision;

use crate::context::RefsContext;
use crate::error::Result;

/// One reflog entry. `index` 0 is the newest and shifts as records are
/// added on top.
pub struct ReflogRecord {
    index: AtomicUsize,
    message: String,
    revision: Arc<Revision>,
}

impl ReflogRecord {
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn revision(&self) -> &Arc<Revision> {
        &self.revision
    }

    fn same_entry(&self, other: &ReflogRecord) -> bool {
        self.revision.hash() == other.revision.hash() && self.message == other.message
    }
}

impl fmt::Debug for ReflogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{{{}}} {} {}",
            self.index(),
            self.revision.hash().short_hex(),
            self.message
        )
    }
}

#[derive(Clone, Debug)]
pub enum ReflogEvent {
    /// A new record was inserted at the top.
    RecordAdded(Arc<ReflogRecord>),
    /// The history no longer lined up and was reloaded from scratch.
    Rebuilt,
}

/// Reflog of one reference, newest first.
///
/// Created empty and stale; [`refresh`](Reflog::refresh) queries the
/// repository. A position change of the owning reference marks it stale
/// again.
pub struct Reflog {
    context: Arc<RefsContext>,
    reference: RwLock<String>,
    records: RwLock<Vec<Arc<ReflogRecord>>>,
    stale: AtomicBool,
    events: EventChannel<ReflogEvent>,
}

impl Reflog {
    pub(crate) fn new(context: &Arc<RefsContext>, reference: String) -> Self {
        Self {
            context: Arc::clone(context),
            reference: RwLock::new(reference),
            records: RwLock::new(Vec::new()),
            stale: AtomicBool::new(true),
            events: EventChannel::with_capacity(context.capacity()),
        }
    }

    /// Full name of the owning reference.
    pub fn reference(&self) -> String {
        self.reference
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_reference(&self, full_name: String) {
        *self.reference.write().unwrap_or_else(PoisonError::into_inner) = full_name;
        self.mark_stale();
    }

    pub fn records(&self) -> Vec<Arc<ReflogRecord>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn subscribe(&self) -> EventStream<ReflogEvent> {
        self.events.subscribe()
    }

    /// Refresh only if stale.
    pub fn ensure_fresh(&self) -> Result<()> {
        if self.is_stale() {
            self.refresh()?;
        }
        Ok(())
    }

    /// Query the reflog and merge it into the cached records.
    ///
    /// When the cached records line up with the bottom of the fresh list,
    /// the records above them are inserted at the top (one `RecordAdded`
    /// each, oldest first) and every index is renumbered. Otherwise the list
    /// is rebuilt.
    pub fn refresh(&self) -> Result<()> {
        let reference = self.reference();
        let data = self.context.accessor().query_reflog(&reference)?;
        let fresh: Vec<Arc<ReflogRecord>> = data
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                Arc::new(ReflogRecord {
                    index: AtomicUsize::new(index),
                    message: record.message,
                    revision: self.context.revisions().resolve_one(record.revision),
                })
            })
            .collect();

        let events = {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            let events = match overlap(&records, &fresh) {
                Some(0) if records.len() == fresh.len() => Vec::new(),
                Some(added) => {
                    let new_records = &fresh[..added];
                    let kept = fresh.len() - added;
                    let mut merged: Vec<Arc<ReflogRecord>> = new_records.to_vec();
                    merged.extend(records.drain(..).take(kept));
                    for (index, record) in merged.iter().enumerate() {
                        record.index.store(index, Ordering::Release);
                    }
                    *records = merged;
                    new_records
                        .iter()
                        .rev()
                        .map(|r| ReflogEvent::RecordAdded(Arc::clone(r)))
                        .collect()
                }
                None if records.is_empty() && fresh.is_empty() => Vec::new(),
                None => {
                    *records = fresh;
                    vec![ReflogEvent::Rebuilt]
                }
            };
            self.stale.store(false, Ordering::Release);
            events
        };

        debug!(reference = %reference, events = events.len(), "reflog refreshed");
        for event in events {
            self.events.emit(event);
        }
        Ok(())
    }
}

/// Number of records on top of `fresh` that are new, if the rest of `fresh`
/// lines up with the start of `cached`. Entries may have expired from the
/// bottom, so the overlap can be shorter than `cached`.
fn overlap(cached: &[Arc<ReflogRecord>], fresh: &[Arc<ReflogRecord>]) -> Option<usize> {
    if cached.is_empty() {
        return None;
    }
    (fresh.len().saturating_sub(cached.len())..fresh.len()).find(|&added| {
        fresh[added..]
            .iter()
            .zip(cached)
            .all(|(new, old)| new.same_entry(old))
    })
}

impl fmt::Debug for Reflog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflog")
            .field("reference", &self.reference())
            .field("records", &self.count())
            .field("stale", &self.is_stale())
            .finish()
    }
}
