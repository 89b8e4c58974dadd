//! The repository handle: every cache of one repository behind one object.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use replica_accessor::{
    FetchParameters, PullParameters, QueryRevisionsParameters, RepositoryAccessor,
    RepositoryStateData,
};
use replica_diff::{RefsDiff, RefsState};
use replica_events::{ChangeCategories, NotificationGate};
use replica_refs::{Head, RefreshOutcome, RefsCollection, RefsContext};
use replica_revisions::{Revision, RevisionCache};
use replica_types::{ReferenceTypes, User};

use crate::cancel::CancellationToken;
use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::records::{ConfigParameters, Notes, Remotes, Submodules, Users};
use crate::stash::StashedStates;
use crate::status::{RepositoryState, Status};

/// Categories a remote operation may change.
const REMOTE_OPERATION: ChangeCategories = ChangeCategories::BRANCHES
    .union(ChangeCategories::REMOTE_BRANCHES)
    .union(ChangeCategories::TAGS)
    .union(ChangeCategories::HEAD)
    .union(ChangeCategories::WORKING_TREE);

/// In-memory replica of one external repository.
///
/// A handle starts empty; [`RepositoryLoader`](crate::RepositoryLoader)
/// populates it in a fixed order. After [`dispose`](Repository::dispose)
/// every refresh and remote operation fails with [`RepoError::Disposed`].
pub struct Repository {
    config: RepositoryConfig,
    context: Arc<RefsContext>,
    refs: Arc<RefsCollection>,
    head: Arc<Head>,
    configuration: ConfigParameters,
    stash: StashedStates,
    notes: Notes,
    remotes: Remotes,
    submodules: Submodules,
    users: Users,
    status: Status,
    state: RepositoryState,
    user_identity: RwLock<Option<User>>,
    disposed: AtomicBool,
}

impl Repository {
    /// Create an empty, unloaded handle.
    pub fn new(
        accessor: Arc<dyn RepositoryAccessor>,
        config: RepositoryConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let capacity = config.channel_capacity;
        let revisions = Arc::new(RevisionCache::new(Arc::clone(&accessor)));
        let gate = Arc::new(NotificationGate::with_capacity(capacity));
        let context = Arc::new(RefsContext::new(Arc::clone(&revisions), gate, capacity));
        let refs = Arc::new(RefsCollection::new(&context));
        let head = Head::new(&context, Arc::clone(refs.heads()));
        Ok(Arc::new(Self {
            configuration: ConfigParameters::new(capacity),
            stash: StashedStates::new(revisions, capacity),
            notes: Notes::new(capacity),
            remotes: Remotes::new(capacity),
            submodules: Submodules::new(capacity),
            users: Users::new(capacity),
            status: Status::new(Arc::clone(&accessor), capacity),
            state: RepositoryState::new(accessor),
            user_identity: RwLock::new(None),
            disposed: AtomicBool::new(false),
            config,
            context,
            refs,
            head,
        }))
    }

    // ---- Accessors ----

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn accessor(&self) -> &Arc<dyn RepositoryAccessor> {
        self.context.accessor()
    }

    pub fn context(&self) -> &Arc<RefsContext> {
        &self.context
    }

    pub fn revisions(&self) -> &Arc<RevisionCache> {
        self.context.revisions()
    }

    pub fn gate(&self) -> &NotificationGate {
        self.context.gate()
    }

    pub fn refs(&self) -> &Arc<RefsCollection> {
        &self.refs
    }

    pub fn head(&self) -> &Arc<Head> {
        &self.head
    }

    pub fn configuration(&self) -> &ConfigParameters {
        &self.configuration
    }

    pub fn stash(&self) -> &StashedStates {
        &self.stash
    }

    pub fn notes(&self) -> &Notes {
        &self.notes
    }

    pub fn remotes(&self) -> &Remotes {
        &self.remotes
    }

    pub fn submodules(&self) -> &Submodules {
        &self.submodules
    }

    /// Contributors.
    pub fn users(&self) -> &Users {
        &self.users
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn state(&self) -> RepositoryStateData {
        self.state.get()
    }

    /// Identity new commits are made with, from `user.name`/`user.email`.
    pub fn user_identity(&self) -> Option<User> {
        self.user_identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty()
    }

    // ---- Lifetime ----

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn ensure_alive(&self) -> Result<()> {
        if self.is_disposed() {
            Err(RepoError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Stop monitoring and reject further operations. Returns `true` on the
    /// first call.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.gate().disable();
        info!("repository disposed");
        true
    }

    // ---- Single-kind refreshes ----

    pub fn refresh_configuration(&self) -> Result<()> {
        let records = self.accessor().query_config()?;
        self.configuration.merge(records);
        *self
            .user_identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.configuration.user_identity();
        Ok(())
    }

    pub fn refresh_references(&self, types: ReferenceTypes) -> Result<RefreshOutcome> {
        Ok(self.refs.refresh_types(types)?)
    }

    pub fn refresh_stash(&self) -> Result<()> {
        self.stash.refresh()?;
        Ok(())
    }

    pub fn refresh_head(&self) -> Result<()> {
        self.head.refresh()?;
        Ok(())
    }

    pub fn refresh_notes(&self) -> Result<()> {
        self.notes.merge(self.accessor().query_notes()?);
        Ok(())
    }

    pub fn refresh_remotes(&self) -> Result<()> {
        self.remotes.merge(self.accessor().query_remotes()?);
        Ok(())
    }

    pub fn refresh_submodules(&self) -> Result<()> {
        self.submodules.merge(self.accessor().query_submodules()?);
        Ok(())
    }

    pub fn refresh_users(&self) -> Result<()> {
        self.users.merge(self.accessor().query_users()?);
        Ok(())
    }

    pub fn refresh_status(&self) -> Result<()> {
        self.status.refresh()?;
        Ok(())
    }

    pub fn refresh_state(&self) -> Result<RepositoryStateData> {
        self.state.refresh()
    }

    /// Last loading step: repository state, user identity, monitoring.
    pub(crate) fn finalize(&self) -> Result<()> {
        let state = self.refresh_state()?;
        let identity = self.configuration.user_identity();
        *self
            .user_identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = identity;
        if self.config.enable_monitoring {
            self.gate().enable_monitoring();
        }
        debug!(?state, monitoring = self.gate().is_monitoring(), "repository finalized");
        Ok(())
    }

    // ---- Category refresh ----

    /// Refresh what a change in `categories` may have affected.
    pub fn refresh(&self, categories: ChangeCategories) -> Result<()> {
        self.ensure_alive()?;
        debug!(?categories, "refreshing repository");
        if categories.contains(ChangeCategories::CONFIG) {
            self.refresh_configuration()?;
        }
        let types = categories.reference_types();
        if !types.is_empty() {
            let outcome = self.refresh_references(types)?;
            if types.contains(ReferenceTypes::STASH) {
                if outcome.has_stash() {
                    self.refresh_stash()?;
                } else {
                    self.stash.clear();
                }
            }
        }
        if categories.intersects(ChangeCategories::BRANCHES | ChangeCategories::HEAD) {
            self.refresh_head()?;
        }
        if categories.contains(ChangeCategories::NOTES) {
            self.refresh_notes()?;
        }
        if categories.contains(ChangeCategories::REMOTES) {
            self.refresh_remotes()?;
        }
        if categories.contains(ChangeCategories::SUBMODULES) && self.config.load_submodules {
            self.refresh_submodules()?;
        }
        if categories.contains(ChangeCategories::WORKING_TREE) {
            self.refresh_status()?;
            self.refresh_state()?;
        }
        Ok(())
    }

    /// [`refresh`](Self::refresh) on the blocking pool.
    pub async fn refresh_async(self: Arc<Self>, categories: ChangeCategories) -> Result<()> {
        tokio::task::spawn_blocking(move || self.refresh(categories))
            .await
            .map_err(RepoError::task)?
    }

    /// Serve the gate's refresh requests until `cancel` fires or the
    /// repository is disposed. A failed refresh is logged and the loop
    /// keeps going.
    pub async fn serve_refresh_requests(self: Arc<Self>, cancel: CancellationToken) {
        let mut requests = self.gate().subscribe();
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => return,
                request = requests.recv() => request,
            };
            let categories = match request {
                Ok(request) => request.categories,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "refresh requests lagged, refreshing everything");
                    ChangeCategories::all()
                }
                Err(RecvError::Closed) => return,
            };
            if self.is_disposed() {
                return;
            }
            match Arc::clone(&self).refresh_async(categories).await {
                Ok(()) => {}
                Err(RepoError::Disposed) => return,
                Err(err) => warn!(?categories, error = %err, "refresh failed"),
            }
        }
    }

    // ---- History ----

    /// History reachable from `references` (or `HEAD`), newest first,
    /// capped by the configured history limit.
    pub fn history(&self, references: Vec<String>) -> Result<Vec<Arc<Revision>>> {
        self.ensure_alive()?;
        let parameters = QueryRevisionsParameters {
            references,
            max_count: self.config.history_limit,
        };
        Ok(self.revisions().query_history(&parameters)?)
    }

    // ---- Remote operations ----

    pub fn fetch(&self, parameters: &FetchParameters) -> Result<RefsDiff> {
        self.remote_operation("fetch", |accessor| accessor.fetch(parameters))
    }

    pub fn pull(&self, parameters: &PullParameters) -> Result<RefsDiff> {
        let diff = self.remote_operation("pull", |accessor| accessor.pull(parameters))?;
        self.refresh_status()?;
        Ok(diff)
    }

    /// Delete remote branches that no longer exist on `remote`.
    pub fn prune(&self, remote: &str) -> Result<RefsDiff> {
        self.remote_operation("prune", |accessor| accessor.prune(remote))
    }

    /// Run `operation` between two reference snapshots and report what it
    /// changed. The watcher is suppressed meanwhile; the refresh here
    /// replaces the one it would trigger.
    fn remote_operation(
        &self,
        name: &'static str,
        operation: impl FnOnce(&dyn RepositoryAccessor) -> replica_accessor::Result<()>,
    ) -> Result<RefsDiff> {
        self.ensure_alive()?;
        let _scope = self.gate().suppress(REMOTE_OPERATION);
        let before = RefsState::capture(&self.refs, ReferenceTypes::REFERENCES);
        operation(self.accessor().as_ref())?;
        self.refs.refresh_types(ReferenceTypes::REFERENCES)?;
        self.head.refresh()?;
        let after = RefsState::capture(&self.refs, ReferenceTypes::REFERENCES);
        let diff = RefsDiff::calculate(&before, &after);
        info!(
            operation = name,
            added = diff.additions(),
            moved = diff.moves(),
            removed = diff.removals(),
            "remote operation finished"
        );
        Ok(diff)
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("heads", &self.refs.heads().count())
            .field("remotes", &self.refs.remotes().count())
            .field("tags", &self.refs.tags().count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
