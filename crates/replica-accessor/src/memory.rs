//! In-memory accessor for tests, fixtures, and offline inspection.
//!
//! [`InMemoryAccessor`] keeps a whole repository description (a
//! [`RepositoryFixture`]) behind a `RwLock` and answers every
//! [`RepositoryAccessor`] operation from it, applying mutations the way the
//! external tool would. It also keeps a journal of every call and supports
//! one-shot fault injection per operation, so cache behaviour around external
//! round-trips can be asserted.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use replica_types::{Hash, ReferenceType, ReferenceTypes};

use crate::error::{AccessorError, Result};
use crate::params::{
    BranchQueryMode, BranchRestriction, CreateBranchParameters, CreateTagParameters,
    DeleteBranchParameters, FetchParameters, MergeParameters, PullParameters,
    QueryBranchesParameters, QueryRevisionsParameters, ResetParameters,
};
use crate::records::{
    BranchData, ConfigParameterData, HeadData, NoteData, ReferencesData, ReflogRecordData,
    RemoteData, RepositoryStateData, RevisionData, StashedStateData, StatusData, SubmoduleData,
    TagData, TagKind, UserData,
};
use crate::traits::RepositoryAccessor;

/// Complete description of a repository, as served by [`InMemoryAccessor`].
///
/// Every field defaults to empty, so fixtures only spell out what a test
/// needs. Reference targets without a matching entry in `revisions` are
/// served as hash-only commits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryFixture {
    pub config: Vec<ConfigParameterData>,
    pub revisions: Vec<RevisionData>,
    /// Local branches by short name.
    pub heads: BTreeMap<String, Hash>,
    /// Remote branches by short name (`origin/main`).
    pub remote_branches: BTreeMap<String, Hash>,
    pub tags: Vec<TagData>,
    pub head: HeadData,
    /// Stash entries, newest first.
    pub stash: Vec<RevisionData>,
    pub notes: Vec<NoteData>,
    pub remotes: Vec<RemoteData>,
    pub submodules: Vec<SubmoduleData>,
    pub users: Vec<UserData>,
    pub status: StatusData,
    pub state: RepositoryStateData,
    /// Reflogs by full reference name, newest first.
    pub reflogs: BTreeMap<String, Vec<ReflogRecordData>>,
    /// Branch tips on each remote (`remote -> branch -> hash`), as the next
    /// fetch will observe them.
    pub upstream: BTreeMap<String, BTreeMap<String, Hash>>,
}

impl Default for RepositoryFixture {
    fn default() -> Self {
        Self {
            config: Vec::new(),
            revisions: Vec::new(),
            heads: BTreeMap::new(),
            remote_branches: BTreeMap::new(),
            tags: Vec::new(),
            head: HeadData::Attached {
                branch: "main".into(),
            },
            stash: Vec::new(),
            notes: Vec::new(),
            remotes: Vec::new(),
            submodules: Vec::new(),
            users: Vec::new(),
            status: StatusData::default(),
            state: RepositoryStateData::default(),
            reflogs: BTreeMap::new(),
            upstream: BTreeMap::new(),
        }
    }
}

impl RepositoryFixture {
    /// Parse a fixture from JSON.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Mutable state behind the accessor lock.
#[derive(Debug)]
struct State {
    fixture: RepositoryFixture,
    revisions: HashMap<Hash, RevisionData>,
}

impl State {
    fn new(fixture: RepositoryFixture) -> Self {
        let mut state = Self {
            revisions: fixture
                .revisions
                .iter()
                .map(|r| (r.hash, r.clone()))
                .collect(),
            fixture,
        };
        let targets: Vec<Hash> = state
            .fixture
            .heads
            .values()
            .chain(state.fixture.remote_branches.values())
            .chain(state.fixture.tags.iter().map(|t| &t.target))
            .chain(state.fixture.upstream.values().flat_map(|b| b.values()))
            .copied()
            .collect();
        for hash in targets {
            state.ensure_revision(hash);
        }
        if let HeadData::Detached { hash } = state.fixture.head {
            state.ensure_revision(hash);
        }
        for entry in state.fixture.stash.clone() {
            state.revisions.entry(entry.hash).or_insert(entry);
        }
        state
    }

    fn ensure_revision(&mut self, hash: Hash) {
        self.revisions
            .entry(hash)
            .or_insert_with(|| RevisionData::new(hash, ""));
    }

    fn head_revision(&self) -> Option<Hash> {
        match &self.fixture.head {
            HeadData::Attached { branch } => self.fixture.heads.get(branch).copied(),
            HeadData::Detached { hash } => Some(*hash),
        }
    }

    fn current_branch(&self) -> Option<&str> {
        match &self.fixture.head {
            HeadData::Attached { branch } => Some(branch.as_str()),
            HeadData::Detached { .. } => None,
        }
    }

    /// Returns `true` if `ancestor` is reachable from `descendant` (or equal).
    fn is_ancestor(&self, ancestor: Hash, descendant: Hash) -> bool {
        let mut queue = VecDeque::from([descendant]);
        let mut seen = HashSet::new();
        while let Some(hash) = queue.pop_front() {
            if hash == ancestor {
                return true;
            }
            if !seen.insert(hash) {
                continue;
            }
            if let Some(rev) = self.revisions.get(&hash) {
                queue.extend(rev.parents.iter().copied());
            }
        }
        false
    }

    fn resolve(&self, expression: &str) -> Result<Hash> {
        let unknown = || AccessorError::UnknownRevision {
            revision: expression.to_string(),
        };
        if let Ok(hash) = Hash::from_hex(expression) {
            return if self.revisions.contains_key(&hash) {
                Ok(hash)
            } else {
                Err(unknown())
            };
        }
        if expression == "HEAD" {
            return self.head_revision().ok_or_else(unknown);
        }
        let (kind, name) = match ReferenceType::classify(expression) {
            Ok((kind, short)) => (Some(kind), short),
            Err(_) => (None, expression),
        };
        let local = || self.fixture.heads.get(name).copied();
        let remote = || self.fixture.remote_branches.get(name).copied();
        let tag = || {
            self.fixture
                .tags
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.target)
        };
        let found = match kind {
            Some(ReferenceType::LocalBranch) => local(),
            Some(ReferenceType::RemoteBranch) => remote(),
            Some(ReferenceType::Tag) => tag(),
            Some(ReferenceType::Stash) => self.fixture.stash.first().map(|r| r.hash),
            Some(ReferenceType::Head) => self.head_revision(),
            None => local().or_else(remote).or_else(tag),
        };
        found.ok_or_else(unknown)
    }

    fn revision(&self, hash: &Hash) -> Result<RevisionData> {
        self.revisions
            .get(hash)
            .cloned()
            .ok_or_else(|| AccessorError::UnknownRevision {
                revision: hash.to_hex(),
            })
    }

    fn branch_data(&self, name: &str, target: Hash, remote: bool) -> BranchData {
        let is_current = !remote && self.current_branch() == Some(name);
        BranchData {
            name: name.to_string(),
            target,
            is_remote: remote,
            is_current,
            upstream: None,
        }
    }

    fn record_reflog(&mut self, reference: &str, message: String, hash: Hash) {
        let Ok(revision) = self.revision(&hash) else {
            return;
        };
        self.fixture
            .reflogs
            .entry(reference.to_string())
            .or_default()
            .insert(0, ReflogRecordData { message, revision });
    }

    /// Move `HEAD` (and the branch it is attached to) to `hash`.
    fn move_head(&mut self, hash: Hash, message: String) {
        match self.fixture.head.clone() {
            HeadData::Attached { branch } => {
                self.fixture.heads.insert(branch.clone(), hash);
                self.record_reflog(
                    &ReferenceType::LocalBranch.full_name(&branch),
                    message.clone(),
                    hash,
                );
            }
            HeadData::Detached { .. } => {
                self.fixture.head = HeadData::Detached { hash };
            }
        }
        self.record_reflog("HEAD", message, hash);
    }

    fn known_remote(&self, remote: &str) -> bool {
        self.fixture.upstream.contains_key(remote)
            || self.fixture.remotes.iter().any(|r| r.name == remote)
    }

    fn fetch_remote(&mut self, remote: &str, prune: bool) {
        let branches = self.fixture.upstream.get(remote).cloned().unwrap_or_default();
        for (branch, hash) in &branches {
            self.ensure_revision(*hash);
            self.fixture
                .remote_branches
                .insert(format!("{remote}/{branch}"), *hash);
        }
        if prune {
            self.prune_remote(remote);
        }
    }

    fn prune_remote(&mut self, remote: &str) {
        let prefix = format!("{remote}/");
        let live = self.fixture.upstream.get(remote).cloned().unwrap_or_default();
        self.fixture.remote_branches.retain(|name, _| match name.strip_prefix(&prefix) {
            Some(branch) => live.contains_key(branch),
            None => true,
        });
    }
}

/// Callback run with the operation name on every accessor call.
pub type CallObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Fixture-driven [`RepositoryAccessor`].
pub struct InMemoryAccessor {
    state: RwLock<State>,
    journal: Mutex<Vec<String>>,
    faults: Mutex<HashMap<String, AccessorError>>,
    observer: RwLock<Option<CallObserver>>,
}

impl InMemoryAccessor {
    /// Create an accessor serving an empty repository (unborn `main`).
    pub fn new() -> Self {
        Self::from_fixture(RepositoryFixture::default())
    }

    pub fn from_fixture(fixture: RepositoryFixture) -> Self {
        Self {
            state: RwLock::new(State::new(fixture)),
            journal: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            observer: RwLock::new(None),
        }
    }

    /// Replace the served repository, as if it had been changed externally.
    /// The journal and pending faults are kept.
    pub fn replace_fixture(&self, fixture: RepositoryFixture) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = State::new(fixture);
    }

    /// Apply an arbitrary change to the served repository.
    pub fn modify(&self, change: impl FnOnce(&mut RepositoryFixture)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut state.fixture);
        let fixture = std::mem::take(&mut state.fixture);
        *state = State::new(fixture);
    }

    /// Snapshot of the served repository.
    pub fn fixture(&self) -> RepositoryFixture {
        self.read_state().fixture.clone()
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &str, error: AccessorError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation.to_string(), error);
    }

    /// Names of all operations invoked so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `operation` has been invoked.
    pub fn call_count(&self, operation: &str) -> usize {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| *c == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Run `observer` on every subsequent call, before the call touches the
    /// repository. Stands in for an external change watcher reacting to
    /// the tool's own writes.
    pub fn on_call(&self, observer: impl Fn(&str) + Send + Sync + 'static) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(observer));
    }

    /// Journal the call, notify the observer and fire any injected fault.
    fn enter(&self, operation: &str) -> Result<()> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation.to_string());
        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(operation);
        }
        match self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(operation)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InMemoryAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryAccessor")
            .field("state", &*self.read_state())
            .field("calls", &self.calls().len())
            .finish()
    }
}

impl Default for InMemoryAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryAccessor for InMemoryAccessor {
    fn query_config(&self) -> Result<Vec<ConfigParameterData>> {
        self.enter("query_config")?;
        Ok(self.read_state().fixture.config.clone())
    }

    fn query_references(&self, types: ReferenceTypes) -> Result<ReferencesData> {
        self.enter("query_references")?;
        let state = self.read_state();
        let fixture = &state.fixture;
        let heads = types.contains(ReferenceTypes::LOCAL_BRANCHES).then(|| {
            fixture
                .heads
                .iter()
                .map(|(name, target)| state.branch_data(name, *target, false))
                .collect()
        });
        let remotes = types.contains(ReferenceTypes::REMOTE_BRANCHES).then(|| {
            fixture
                .remote_branches
                .iter()
                .map(|(name, target)| state.branch_data(name, *target, true))
                .collect()
        });
        let tags = types
            .contains(ReferenceTypes::TAGS)
            .then(|| fixture.tags.clone());
        let stash = if types.contains(ReferenceTypes::STASH) {
            fixture.stash.first().map(|r| r.hash)
        } else {
            None
        };
        Ok(ReferencesData {
            heads,
            remotes,
            tags,
            stash,
        })
    }

    fn query_branches(
        &self,
        parameters: &QueryBranchesParameters,
    ) -> Result<Vec<BranchData>> {
        self.enter("query_branches")?;
        let state = self.read_state();
        let fixture = &state.fixture;
        let mut candidates = Vec::new();
        if parameters.restriction != BranchRestriction::Remote {
            candidates.extend(
                fixture
                    .heads
                    .iter()
                    .map(|(name, target)| state.branch_data(name, *target, false)),
            );
        }
        if parameters.restriction != BranchRestriction::Local {
            candidates.extend(
                fixture
                    .remote_branches
                    .iter()
                    .map(|(name, target)| state.branch_data(name, *target, true)),
            );
        }
        let branches = candidates
            .into_iter()
            .filter(|b| match &parameters.mode {
                BranchQueryMode::Default => true,
                BranchQueryMode::Merged(into) => state.is_ancestor(b.target, *into),
                BranchQueryMode::Unmerged(into) => !state.is_ancestor(b.target, *into),
                BranchQueryMode::Contains(rev) => state.is_ancestor(*rev, b.target),
            })
            .collect();
        Ok(branches)
    }

    fn query_tags(&self) -> Result<Vec<TagData>> {
        self.enter("query_tags")?;
        Ok(self.read_state().fixture.tags.clone())
    }

    fn query_revision(&self, hash: &Hash) -> Result<RevisionData> {
        self.enter("query_revision")?;
        self.read_state().revision(hash)
    }

    fn query_revisions(
        &self,
        parameters: &QueryRevisionsParameters,
    ) -> Result<Vec<RevisionData>> {
        self.enter("query_revisions")?;
        let state = self.read_state();
        let starts = if parameters.references.is_empty() {
            state.head_revision().into_iter().collect::<Vec<_>>()
        } else {
            parameters
                .references
                .iter()
                .map(|r| state.resolve(r))
                .collect::<Result<Vec<_>>>()?
        };
        let limit = parameters.max_count.unwrap_or(usize::MAX);
        let mut queue: VecDeque<Hash> = starts.into();
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        while let Some(hash) = queue.pop_front() {
            if result.len() >= limit {
                break;
            }
            if !seen.insert(hash) {
                continue;
            }
            let revision = state.revision(&hash)?;
            queue.extend(revision.parents.iter().copied());
            result.push(revision);
        }
        Ok(result)
    }

    fn dereference(&self, expression: &str) -> Result<RevisionData> {
        self.enter("dereference")?;
        let state = self.read_state();
        let hash = state.resolve(expression)?;
        state.revision(&hash)
    }

    fn query_reflog(&self, reference: &str) -> Result<Vec<ReflogRecordData>> {
        self.enter("query_reflog")?;
        Ok(self
            .read_state()
            .fixture
            .reflogs
            .get(reference)
            .cloned()
            .unwrap_or_default())
    }

    fn query_head(&self) -> Result<HeadData> {
        self.enter("query_head")?;
        Ok(self.read_state().fixture.head.clone())
    }

    fn query_stash(&self) -> Result<Vec<StashedStateData>> {
        self.enter("query_stash")?;
        Ok(self
            .read_state()
            .fixture
            .stash
            .iter()
            .enumerate()
            .map(|(index, revision)| StashedStateData {
                index,
                revision: revision.clone(),
            })
            .collect())
    }

    fn query_notes(&self) -> Result<Vec<NoteData>> {
        self.enter("query_notes")?;
        Ok(self.read_state().fixture.notes.clone())
    }

    fn query_remotes(&self) -> Result<Vec<RemoteData>> {
        self.enter("query_remotes")?;
        Ok(self.read_state().fixture.remotes.clone())
    }

    fn query_submodules(&self) -> Result<Vec<SubmoduleData>> {
        self.enter("query_submodules")?;
        Ok(self.read_state().fixture.submodules.clone())
    }

    fn query_users(&self) -> Result<Vec<UserData>> {
        self.enter("query_users")?;
        Ok(self.read_state().fixture.users.clone())
    }

    fn query_status(&self) -> Result<StatusData> {
        self.enter("query_status")?;
        Ok(self.read_state().fixture.status)
    }

    fn query_repository_state(&self) -> Result<RepositoryStateData> {
        self.enter("query_repository_state")?;
        Ok(self.read_state().fixture.state)
    }

    fn create_branch(&self, parameters: &CreateBranchParameters) -> Result<()> {
        self.enter("create_branch")?;
        let mut state = self.write_state();
        if state.fixture.heads.contains_key(&parameters.name) {
            return Err(AccessorError::BranchAlreadyExists {
                name: parameters.name.clone(),
            });
        }
        let target = state.resolve(&parameters.starting_revision)?;
        state.fixture.heads.insert(parameters.name.clone(), target);
        state.record_reflog(
            &ReferenceType::LocalBranch.full_name(&parameters.name),
            format!("branch: Created from {}", parameters.starting_revision),
            target,
        );
        if parameters.checkout {
            state.fixture.head = HeadData::Attached {
                branch: parameters.name.clone(),
            };
        }
        debug!(name = %parameters.name, target = %target.short_hex(), "created branch");
        Ok(())
    }

    fn rename_branch(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.enter("rename_branch")?;
        let mut state = self.write_state();
        if state.fixture.heads.contains_key(new_name) {
            return Err(AccessorError::BranchAlreadyExists {
                name: new_name.to_string(),
            });
        }
        let target = state
            .fixture
            .heads
            .remove(old_name)
            .ok_or_else(|| AccessorError::BranchNotFound {
                name: old_name.to_string(),
            })?;
        state.fixture.heads.insert(new_name.to_string(), target);
        let old_full = ReferenceType::LocalBranch.full_name(old_name);
        if let Some(reflog) = state.fixture.reflogs.remove(&old_full) {
            state
                .fixture
                .reflogs
                .insert(ReferenceType::LocalBranch.full_name(new_name), reflog);
        }
        if state.current_branch() == Some(old_name) {
            state.fixture.head = HeadData::Attached {
                branch: new_name.to_string(),
            };
        }
        Ok(())
    }

    fn delete_branch(&self, parameters: &DeleteBranchParameters) -> Result<()> {
        self.enter("delete_branch")?;
        let mut state = self.write_state();
        let not_found = || AccessorError::BranchNotFound {
            name: parameters.name.clone(),
        };
        if parameters.remote {
            state
                .fixture
                .remote_branches
                .remove(&parameters.name)
                .ok_or_else(not_found)?;
            return Ok(());
        }
        let target = *state.fixture.heads.get(&parameters.name).ok_or_else(not_found)?;
        if state.current_branch() == Some(parameters.name.as_str()) {
            return Err(AccessorError::operation(
                "delete_branch",
                format!("cannot delete checked out branch '{}'", parameters.name),
            ));
        }
        if !parameters.force {
            let merged = state
                .head_revision()
                .is_some_and(|head| state.is_ancestor(target, head));
            if !merged {
                return Err(AccessorError::BranchNotFullyMerged {
                    name: parameters.name.clone(),
                });
            }
        }
        state.fixture.heads.remove(&parameters.name);
        state
            .fixture
            .reflogs
            .remove(&ReferenceType::LocalBranch.full_name(&parameters.name));
        Ok(())
    }

    fn reset_branch(&self, name: &str, target: &Hash) -> Result<()> {
        self.enter("reset_branch")?;
        let mut state = self.write_state();
        if !state.fixture.heads.contains_key(name) {
            return Err(AccessorError::BranchNotFound {
                name: name.to_string(),
            });
        }
        if state.current_branch() == Some(name) {
            return Err(AccessorError::operation(
                "reset_branch",
                format!("branch '{name}' is checked out"),
            ));
        }
        state.revision(target)?;
        state.fixture.heads.insert(name.to_string(), *target);
        state.record_reflog(
            &ReferenceType::LocalBranch.full_name(name),
            format!("branch: Reset to {}", target.short_hex()),
            *target,
        );
        Ok(())
    }

    fn create_tag(&self, parameters: &CreateTagParameters) -> Result<()> {
        self.enter("create_tag")?;
        let mut state = self.write_state();
        if state.fixture.tags.iter().any(|t| t.name == parameters.name) {
            return Err(AccessorError::TagAlreadyExists {
                name: parameters.name.clone(),
            });
        }
        let target = state.resolve(&parameters.target)?;
        let kind = if parameters.message.is_some() {
            TagKind::Annotated
        } else {
            TagKind::Lightweight
        };
        state.fixture.tags.push(TagData {
            name: parameters.name.clone(),
            target,
            kind,
            message: parameters.message.clone(),
        });
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.enter("delete_tag")?;
        let mut state = self.write_state();
        let before = state.fixture.tags.len();
        state.fixture.tags.retain(|t| t.name != name);
        if state.fixture.tags.len() == before {
            return Err(AccessorError::TagNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn reset(&self, parameters: &ResetParameters) -> Result<()> {
        self.enter("reset")?;
        let mut state = self.write_state();
        let target = state.resolve(&parameters.revision)?;
        state.move_head(target, format!("reset: moving to {}", parameters.revision));
        Ok(())
    }

    fn merge(&self, parameters: &MergeParameters) -> Result<()> {
        self.enter("merge")?;
        let mut state = self.write_state();
        let head = state
            .head_revision()
            .ok_or_else(|| AccessorError::operation("merge", "HEAD does not point to a commit"))?;
        let targets = parameters
            .revisions
            .iter()
            .map(|r| state.resolve(r))
            .collect::<Result<Vec<_>>>()?;
        let pending: Vec<Hash> = targets
            .into_iter()
            .filter(|t| !state.is_ancestor(*t, head))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        if let [single] = pending.as_slice() {
            if !parameters.no_fast_forward && state.is_ancestor(head, *single) {
                let single = *single;
                state.move_head(single, "merge: Fast-forward".into());
                return Ok(());
            }
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"replica-merge-v1:");
        hasher.update(head.as_bytes());
        for parent in &pending {
            hasher.update(parent.as_bytes());
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..20]);
        let merge_hash = Hash::from_bytes(bytes);
        let subject = parameters
            .message
            .clone()
            .unwrap_or_else(|| format!("Merge {}", parameters.revisions.join(", ")));
        let mut parents = vec![head];
        parents.extend(pending);
        state
            .revisions
            .insert(merge_hash, RevisionData::new(merge_hash, subject).with_parents(parents));
        state.move_head(merge_hash, "merge: Merge made".into());
        Ok(())
    }

    fn fetch(&self, parameters: &FetchParameters) -> Result<()> {
        self.enter("fetch")?;
        let mut state = self.write_state();
        let remotes: Vec<String> = match &parameters.remote {
            Some(remote) => {
                if !state.known_remote(remote) {
                    return Err(AccessorError::RemoteNotFound {
                        name: remote.clone(),
                    });
                }
                vec![remote.clone()]
            }
            None => state.fixture.upstream.keys().cloned().collect(),
        };
        for remote in &remotes {
            state.fetch_remote(remote, parameters.prune);
        }
        debug!(remotes = remotes.len(), prune = parameters.prune, "fetched");
        Ok(())
    }

    fn pull(&self, parameters: &PullParameters) -> Result<()> {
        self.enter("pull")?;
        let (remote, branch) = {
            let mut state = self.write_state();
            let remote = parameters.remote.clone().unwrap_or_else(|| "origin".into());
            if !state.known_remote(&remote) {
                return Err(AccessorError::RemoteNotFound { name: remote });
            }
            state.fetch_remote(&remote, false);
            let branch = match &parameters.branch {
                Some(branch) => branch.clone(),
                None => state
                    .current_branch()
                    .map(str::to_string)
                    .ok_or_else(|| AccessorError::operation("pull", "HEAD is detached"))?,
            };
            (remote, branch)
        };
        let revision = format!("{remote}/{branch}");
        {
            let state = self.read_state();
            if !state.fixture.remote_branches.contains_key(&revision) {
                return Err(AccessorError::UnknownRevision { revision });
            }
        }
        self.merge(&MergeParameters {
            revisions: vec![revision],
            ..Default::default()
        })
    }

    fn prune(&self, remote: &str) -> Result<()> {
        self.enter("prune")?;
        let mut state = self.write_state();
        if !state.known_remote(remote) {
            return Err(AccessorError::RemoteNotFound {
                name: remote.to_string(),
            });
        }
        state.prune_remote(remote);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    /// Linear history a <- b <- c with `main` at c and `old` at a.
    fn linear() -> InMemoryAccessor {
        let mut fixture = RepositoryFixture::default();
        fixture.revisions = vec![
            RevisionData::new(hash(1), "a"),
            RevisionData::new(hash(2), "b").with_parents(vec![hash(1)]),
            RevisionData::new(hash(3), "c").with_parents(vec![hash(2)]),
        ];
        fixture.heads.insert("main".into(), hash(3));
        fixture.heads.insert("old".into(), hash(1));
        InMemoryAccessor::from_fixture(fixture)
    }

    #[test]
    fn journal_records_calls() {
        let accessor = linear();
        accessor.query_head().unwrap();
        accessor.query_references(ReferenceTypes::ALL).unwrap();
        assert_eq!(accessor.calls(), vec!["query_head", "query_references"]);
        assert_eq!(accessor.call_count("query_head"), 1);
    }

    #[test]
    fn injected_fault_fires_once() {
        let accessor = linear();
        accessor.fail_next("query_head", AccessorError::operation("query_head", "boom"));
        assert!(accessor.query_head().is_err());
        assert!(accessor.query_head().is_ok());
    }

    #[test]
    fn observer_sees_every_call() {
        let accessor = linear();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        accessor.on_call(move |operation| sink.lock().unwrap().push(operation.to_string()));
        accessor.query_head().unwrap();
        accessor.query_tags().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["query_head", "query_tags"]);
    }

    #[test]
    fn references_respect_requested_types() {
        let accessor = linear();
        let data = accessor
            .query_references(ReferenceTypes::LOCAL_BRANCHES)
            .unwrap();
        assert_eq!(data.heads.as_ref().map(Vec::len), Some(2));
        assert!(data.remotes.is_none());
        assert!(data.tags.is_none());
        let main = data.heads.unwrap().into_iter().find(|b| b.name == "main").unwrap();
        assert!(main.is_current);
    }

    #[test]
    fn unknown_revision_is_a_domain_conflict() {
        let accessor = linear();
        let err = accessor.query_revision(&hash(9)).unwrap_err();
        assert!(matches!(err, AccessorError::UnknownRevision { .. }));
    }

    #[test]
    fn create_existing_branch_conflicts() {
        let accessor = linear();
        let err = accessor
            .create_branch(&CreateBranchParameters {
                name: "main".into(),
                starting_revision: "HEAD".into(),
                checkout: false,
            })
            .unwrap_err();
        assert_eq!(err, AccessorError::BranchAlreadyExists { name: "main".into() });
    }

    #[test]
    fn unmerged_and_containing_queries() {
        let accessor = linear();
        accessor
            .create_branch(&CreateBranchParameters {
                name: "side".into(),
                starting_revision: hash(2).to_hex(),
                checkout: false,
            })
            .unwrap();
        let unmerged = accessor
            .query_branches(&QueryBranchesParameters::new(
                BranchRestriction::Local,
                BranchQueryMode::Unmerged(hash(2)),
            ))
            .unwrap();
        assert_eq!(unmerged.len(), 1);
        assert_eq!(unmerged[0].name, "main");

        let containing = accessor
            .query_branches(&QueryBranchesParameters::new(
                BranchRestriction::All,
                BranchQueryMode::Contains(hash(2)),
            ))
            .unwrap();
        let names: Vec<_> = containing.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["main", "side"]);
    }

    #[test]
    fn fast_forward_merge_moves_current_branch() {
        let accessor = linear();
        accessor
            .reset(&ResetParameters {
                revision: hash(1).to_hex(),
                mode: Default::default(),
            })
            .unwrap();
        accessor
            .merge(&MergeParameters {
                revisions: vec![hash(3).to_hex()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(accessor.fixture().heads["main"], hash(3));
        let reflog = accessor.query_reflog("refs/heads/main").unwrap();
        assert_eq!(reflog[0].message, "merge: Fast-forward");
        assert_eq!(reflog.len(), 2);
    }

    #[test]
    fn fetch_with_prune_mirrors_upstream() {
        let accessor = linear();
        accessor.modify(|f| {
            f.remote_branches.insert("origin/gone".into(), hash(1));
            f.upstream
                .entry("origin".into())
                .or_default()
                .insert("main".into(), hash(3));
        });
        accessor
            .fetch(&FetchParameters {
                remote: Some("origin".into()),
                prune: true,
                tags: false,
            })
            .unwrap();
        let remotes = accessor.fixture().remote_branches;
        assert_eq!(remotes.len(), 1);
        assert_eq!(remotes["origin/main"], hash(3));
    }

    #[test]
    fn fixture_parses_from_json() {
        let json = format!(
            r#"{{"heads": {{"main": "{}"}}, "head": {{"type": "attached", "branch": "main"}}}}"#,
            hash(7)
        );
        let accessor = InMemoryAccessor::from_fixture(RepositoryFixture::from_json(&json).unwrap());
        assert_eq!(accessor.dereference("main").unwrap().hash, hash(7));
    }
}
