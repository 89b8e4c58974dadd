//! Staged, cancellable bootstrap of a [`Repository`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use replica_accessor::RepositoryAccessor;
use replica_refs::RefreshOutcome;
use replica_types::ReferenceTypes;

use crate::cancel::CancellationToken;
use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::repository::Repository;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Reported before a step executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    /// Position of the step in the pipeline, skipped steps included.
    pub index: usize,
    pub total: usize,
    pub action: &'static str,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: LoadProgress);
}

impl<F> ProgressReporter for F
where
    F: Fn(LoadProgress) + Send + Sync,
{
    fn report(&self, progress: LoadProgress) {
        self(progress)
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// State threaded through the steps of one load.
struct LoadContext<'a> {
    repository: &'a Repository,
    /// Result of the references step, consulted by later steps.
    references: Option<RefreshOutcome>,
}

/// One step of the pipeline. A step is a single external round-trip (or a
/// few) and is not cancellable itself.
trait LoadStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Progress text.
    fn action(&self) -> &'static str;

    fn should_run(&self, _context: &LoadContext<'_>) -> bool {
        true
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()>;
}

struct ConfigurationStep;

impl LoadStep for ConfigurationStep {
    fn name(&self) -> &'static str {
        "configuration"
    }

    fn action(&self) -> &'static str {
        "Reading configuration"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_configuration()
    }
}

struct ReferencesStep;

impl LoadStep for ReferencesStep {
    fn name(&self) -> &'static str {
        "references"
    }

    fn action(&self) -> &'static str {
        "Loading references"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.references = Some(context.repository.refresh_references(ReferenceTypes::ALL)?);
        Ok(())
    }
}

/// Runs only when the references query reported a stash.
struct StashStep;

impl LoadStep for StashStep {
    fn name(&self) -> &'static str {
        "stash"
    }

    fn action(&self) -> &'static str {
        "Loading stash"
    }

    fn should_run(&self, context: &LoadContext<'_>) -> bool {
        context
            .references
            .as_ref()
            .is_some_and(RefreshOutcome::has_stash)
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_stash()
    }
}

struct NotesStep;

impl LoadStep for NotesStep {
    fn name(&self) -> &'static str {
        "notes"
    }

    fn action(&self) -> &'static str {
        "Loading notes"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_notes()
    }
}

struct HeadStep;

impl LoadStep for HeadStep {
    fn name(&self) -> &'static str {
        "head"
    }

    fn action(&self) -> &'static str {
        "Reading HEAD"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_head()
    }
}

struct RemotesStep;

impl LoadStep for RemotesStep {
    fn name(&self) -> &'static str {
        "remotes"
    }

    fn action(&self) -> &'static str {
        "Loading remotes"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_remotes()
    }
}

struct SubmodulesStep;

impl LoadStep for SubmodulesStep {
    fn name(&self) -> &'static str {
        "submodules"
    }

    fn action(&self) -> &'static str {
        "Loading submodules"
    }

    fn should_run(&self, context: &LoadContext<'_>) -> bool {
        context.repository.config().load_submodules
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_submodules()
    }
}

/// Skipped on an empty repository, which has no history to attribute.
struct ContributorsStep;

impl LoadStep for ContributorsStep {
    fn name(&self) -> &'static str {
        "contributors"
    }

    fn action(&self) -> &'static str {
        "Loading contributors"
    }

    fn should_run(&self, context: &LoadContext<'_>) -> bool {
        context.repository.config().load_contributors && !context.repository.is_empty()
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_users()
    }
}

struct StatusStep;

impl LoadStep for StatusStep {
    fn name(&self) -> &'static str {
        "status"
    }

    fn action(&self) -> &'static str {
        "Reading working tree status"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.refresh_status()
    }
}

struct FinalizeStep;

impl LoadStep for FinalizeStep {
    fn name(&self) -> &'static str {
        "finalize"
    }

    fn action(&self) -> &'static str {
        "Finishing"
    }

    fn execute(&self, context: &mut LoadContext<'_>) -> Result<()> {
        context.repository.finalize()
    }
}

// ---------------------------------------------------------------------------
// RepositoryLoader
// ---------------------------------------------------------------------------

/// Populates a fresh [`Repository`] in a fixed order:
///
/// configuration -> references -> stash -> notes -> HEAD -> remotes ->
/// submodules -> contributors -> status -> finalize
///
/// The cancellation token is checked before every step. On cancellation the
/// handle is left as is and the caller disposes it through
/// [`repository`](Self::repository); on any other failure the handle is
/// disposed before the error is returned, so a half-loaded repository never
/// escapes.
pub struct RepositoryLoader {
    repository: Arc<Repository>,
    steps: Vec<Box<dyn LoadStep>>,
    progress: Option<Box<dyn ProgressReporter>>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl RepositoryLoader {
    pub fn new(
        accessor: Arc<dyn RepositoryAccessor>,
        config: RepositoryConfig,
    ) -> Result<Self> {
        Ok(Self {
            repository: Repository::new(accessor, config)?,
            steps: vec![
                Box::new(ConfigurationStep),
                Box::new(ReferencesStep),
                Box::new(StashStep),
                Box::new(NotesStep),
                Box::new(HeadStep),
                Box::new(RemotesStep),
                Box::new(SubmodulesStep),
                Box::new(ContributorsStep),
                Box::new(StatusStep),
                Box::new(FinalizeStep),
            ],
            progress: None,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    pub fn with_progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Box::new(reporter));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The handle being loaded.
    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step. A loader runs once.
    pub fn load(&self) -> Result<Arc<Repository>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RepoError::invalid_state("repository loader already ran"));
        }
        let started = Instant::now();
        match self.run() {
            Ok(()) => {
                let refs = self.repository.refs();
                info!(
                    heads = refs.heads().count(),
                    remotes = refs.remotes().count(),
                    tags = refs.tags().count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "repository loaded"
                );
                Ok(Arc::clone(&self.repository))
            }
            Err(RepoError::Cancelled) => {
                warn!("repository loading cancelled");
                Err(RepoError::Cancelled)
            }
            Err(err) => {
                warn!(error = %err, "repository loading failed");
                self.repository.dispose();
                Err(err)
            }
        }
    }

    /// [`load`](Self::load) on the blocking pool. The caller keeps its own
    /// `Arc` to reach [`repository`](Self::repository) after a cancellation.
    pub async fn load_async(self: Arc<Self>) -> Result<Arc<Repository>> {
        tokio::task::spawn_blocking(move || self.load())
            .await
            .map_err(RepoError::task)?
    }

    fn run(&self) -> Result<()> {
        let total = self.steps.len();
        let mut context = LoadContext {
            repository: &self.repository,
            references: None,
        };
        for (index, step) in self.steps.iter().enumerate() {
            self.cancel.check()?;
            if !step.should_run(&context) {
                debug!(step = step.name(), "load step skipped");
                continue;
            }
            if let Some(reporter) = &self.progress {
                reporter.report(LoadProgress {
                    index,
                    total,
                    action: step.action(),
                });
            }
            let step_start = Instant::now();
            step.execute(&mut context).inspect_err(|err| {
                warn!(step = step.name(), error = %err, "load step failed");
            })?;
            debug!(
                step = step.name(),
                elapsed_us = step_start.elapsed().as_micros() as u64,
                "load step finished"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for RepositoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryLoader")
            .field("steps", &self.step_names())
            .field("started", &self.started.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accessor, fixture, hash};
    use replica_accessor::{AccessorError, InMemoryAccessor, RevisionData};
    use replica_events::ChangeCategories;
    use replica_refs::Reference;
    use replica_types::{ErrorKind, User};
    use std::sync::Mutex;

    fn loader(accessor: &Arc<InMemoryAccessor>) -> RepositoryLoader {
        RepositoryLoader::new(accessor.clone(), RepositoryConfig::default()).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<LoadProgress>>>, impl ProgressReporter) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p: LoadProgress| sink.lock().unwrap().push(p))
    }

    #[test]
    fn steps_in_fixed_order() {
        let loader = loader(&accessor(fixture()));
        assert_eq!(
            loader.step_names(),
            vec![
                "configuration",
                "references",
                "stash",
                "notes",
                "head",
                "remotes",
                "submodules",
                "contributors",
                "status",
                "finalize",
            ]
        );
    }

    #[test]
    fn load_without_stash_skips_stash_step() {
        let accessor = accessor(fixture());
        let (seen, reporter) = recorder();
        let repository = loader(&accessor).with_progress(reporter).load().unwrap();

        assert_eq!(
            accessor.calls(),
            vec![
                "query_config",
                "query_references",
                "query_notes",
                "query_head",
                "query_remotes",
                "query_submodules",
                "query_users",
                "query_status",
                "query_repository_state",
            ]
        );
        let indices: Vec<usize> = seen.lock().unwrap().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4, 5, 6, 7, 8, 9]);
        assert!(seen.lock().unwrap().iter().all(|p| p.total == 10));
        assert!(repository.stash().is_empty());
    }

    #[test]
    fn load_populates_every_cache() {
        let mut with_stash = fixture();
        with_stash.stash = vec![RevisionData::new(hash(9), "WIP on main")];
        let accessor = accessor(with_stash);
        let repository = loader(&accessor).load().unwrap();

        assert_eq!(accessor.call_count("query_stash"), 1);
        assert_eq!(repository.stash().top().unwrap().hash(), hash(9));
        assert_eq!(repository.refs().heads().names(), vec!["main"]);
        assert_eq!(repository.refs().remotes().names(), vec!["origin/main"]);
        assert_eq!(repository.refs().tags().names(), vec!["v1"]);
        assert_eq!(repository.head().revision().unwrap().hash(), hash(2));
        assert_eq!(repository.remotes().names(), vec!["origin"]);
        assert_eq!(repository.users().count(), 1);
        assert_eq!(
            repository.user_identity(),
            Some(User::new("Ada", "ada@example.com"))
        );
        assert!(repository.gate().is_monitoring());
        assert!(!repository.is_disposed());
    }

    #[test]
    fn empty_repository_skips_contributors() {
        let accessor = Arc::new(InMemoryAccessor::new());
        let repository = loader(&accessor).load().unwrap();
        assert!(repository.is_empty());
        assert_eq!(accessor.call_count("query_users"), 0);
        assert_eq!(accessor.call_count("query_status"), 1);
    }

    #[test]
    fn config_switches_off_optional_steps() {
        let accessor = accessor(fixture());
        let config = RepositoryConfig {
            load_submodules: false,
            load_contributors: false,
            enable_monitoring: false,
            ..Default::default()
        };
        let repository = RepositoryLoader::new(accessor.clone(), config)
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(accessor.call_count("query_submodules"), 0);
        assert_eq!(accessor.call_count("query_users"), 0);
        assert!(!repository.gate().is_monitoring());
    }

    #[test]
    fn failure_disposes_the_handle() {
        let accessor = accessor(fixture());
        accessor.fail_next("query_notes", AccessorError::operation("notes", "boom"));
        let loader = loader(&accessor);
        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalOperation);
        assert!(loader.repository().is_disposed());
        assert_eq!(accessor.call_count("query_head"), 0);
        assert_eq!(
            loader.repository().refresh(ChangeCategories::all()),
            Err(RepoError::Disposed)
        );
    }

    #[test]
    fn cancellation_stops_between_steps_without_disposing() {
        let accessor = accessor(fixture());
        let token = CancellationToken::new();
        let canceller = token.clone();
        let loader = loader(&accessor)
            .with_cancellation(token)
            .with_progress(move |p: LoadProgress| {
                if p.action == "Reading HEAD" {
                    canceller.cancel();
                }
            });

        let err = loader.load().unwrap_err();
        assert_eq!(err, RepoError::Cancelled);
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(accessor.call_count("query_head"), 1);
        assert_eq!(accessor.call_count("query_remotes"), 0);
        assert!(!loader.repository().is_disposed());
        assert!(loader.repository().dispose());
    }

    #[test]
    fn cancelled_before_start_issues_no_query() {
        let accessor = accessor(fixture());
        let token = CancellationToken::new();
        token.cancel();
        let loader = loader(&accessor).with_cancellation(token);
        assert!(loader.load().unwrap_err().is_cancelled());
        assert!(accessor.calls().is_empty());
    }

    #[test]
    fn loader_runs_once() {
        let accessor = accessor(fixture());
        let loader = loader(&accessor);
        loader.load().unwrap();
        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[tokio::test]
    async fn async_load() {
        let accessor = accessor(fixture());
        let repository = Arc::new(loader(&accessor)).load_async().await.unwrap();
        assert_eq!(repository.refs().heads().count(), 1);
        assert_eq!(accessor.call_count("query_references"), 1);
    }

    #[tokio::test]
    async fn async_cancellation_leaves_handle_to_caller() {
        let accessor = accessor(fixture());
        let token = CancellationToken::new();
        let canceller = token.clone();
        let loader = Arc::new(loader(&accessor).with_cancellation(token).with_progress(
            move |p: LoadProgress| {
                if p.action == "Reading HEAD" {
                    canceller.cancel();
                }
            },
        ));

        let err = Arc::clone(&loader).load_async().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!loader.repository().is_disposed());
        assert!(loader.repository().dispose());
    }
}
