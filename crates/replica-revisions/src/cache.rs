//! The revision identity map.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use replica_accessor::{
    AccessorError, QueryRevisionsParameters, RepositoryAccessor, RevisionData,
};
use replica_types::Hash;

use crate::error::{RevisionError, Result};
use crate::links::ReferenceLinks;
use crate::revision::Revision;

/// Content-addressed store of [`Revision`]s.
///
/// The map lock is held only for lookups and inserts, never while the
/// accessor is queried.
pub struct RevisionCache {
    accessor: Arc<dyn RepositoryAccessor>,
    revisions: RwLock<HashMap<Hash, Arc<Revision>>>,
    links: Arc<ReferenceLinks>,
}

impl RevisionCache {
    pub fn new(accessor: Arc<dyn RepositoryAccessor>) -> Self {
        Self {
            accessor,
            revisions: RwLock::new(HashMap::new()),
            links: Arc::new(ReferenceLinks::new()),
        }
    }

    /// The reference association shared by every revision of this cache.
    pub fn links(&self) -> &Arc<ReferenceLinks> {
        &self.links
    }

    pub fn accessor(&self) -> &Arc<dyn RepositoryAccessor> {
        &self.accessor
    }

    pub fn count(&self) -> usize {
        self.revisions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cached instance for `hash`, without loading anything.
    pub fn try_get_cached(&self, hash: &Hash) -> Option<Arc<Revision>> {
        self.revisions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
    }

    /// The instance for `hash`, inserting a stub if none exists.
    pub fn get_or_create_revision(&self, hash: Hash) -> Arc<Revision> {
        if let Some(existing) = self.try_get_cached(&hash) {
            return existing;
        }
        let mut revisions = self
            .revisions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            revisions
                .entry(hash)
                .or_insert_with(|| Arc::new(Revision::stub(hash, Arc::clone(&self.links)))),
        )
    }

    /// The loaded instance for `hash`, querying the repository if needed.
    ///
    /// Returns `Ok(None)` if the repository does not know the commit.
    pub fn try_get_revision(&self, hash: &Hash) -> Result<Option<Arc<Revision>>> {
        if let Some(existing) = self.try_get_cached(hash) {
            return match self.load(&existing) {
                Ok(()) => Ok(Some(existing)),
                Err(RevisionError::Accessor(AccessorError::UnknownRevision { .. })) => Ok(None),
                Err(err) => Err(err),
            };
        }
        match self.accessor.query_revision(hash) {
            Ok(data) => Ok(Some(self.resolve_one(data))),
            Err(AccessorError::UnknownRevision { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Fill a stub from the repository. Already loaded revisions are left
    /// alone.
    pub fn load(&self, revision: &Revision) -> Result<()> {
        if revision.is_loaded() {
            return Ok(());
        }
        debug!(hash = %revision.hash().short_hex(), "loading revision");
        let data = self.accessor.query_revision(&revision.hash())?;
        let parents = self.parents_of(&data);
        revision.fill(data, parents);
        Ok(())
    }

    /// Turn records into cached instances, in input order. Stubs are filled
    /// from their record; loaded instances are returned as they are.
    pub fn resolve(&self, records: Vec<RevisionData>) -> Vec<Arc<Revision>> {
        records
            .into_iter()
            .map(|data| self.resolve_one(data))
            .collect()
    }

    pub fn resolve_one(&self, data: RevisionData) -> Arc<Revision> {
        let revision = self.get_or_create_revision(data.hash);
        if !revision.is_loaded() {
            let parents = self.parents_of(&data);
            revision.fill(data, parents);
        }
        revision
    }

    /// Run a history query and resolve its records.
    pub fn query_history(
        &self,
        parameters: &QueryRevisionsParameters,
    ) -> Result<Vec<Arc<Revision>>> {
        let records = self.accessor.query_revisions(parameters)?;
        debug!(count = records.len(), "history queried");
        Ok(self.resolve(records))
    }

    /// Resolve an expression (hash or reference name) to a cached revision.
    pub fn dereference(&self, expression: &str) -> Result<Arc<Revision>> {
        let data = self.accessor.dereference(expression)?;
        Ok(self.resolve_one(data))
    }

    /// [`try_get_revision`](Self::try_get_revision) on the blocking pool.
    pub async fn try_get_revision_async(
        self: Arc<Self>,
        hash: Hash,
    ) -> Result<Option<Arc<Revision>>> {
        tokio::task::spawn_blocking(move || self.try_get_revision(&hash))
            .await
            .map_err(|e| RevisionError::Task {
                message: e.to_string(),
            })?
    }

    fn parents_of(&self, data: &RevisionData) -> Vec<Arc<Revision>> {
        data.parents
            .iter()
            .map(|p| self.get_or_create_revision(*p))
            .collect()
    }
}

impl std::fmt::Debug for RevisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionCache")
            .field("revisions", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::{InMemoryAccessor, RepositoryFixture};

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    fn setup() -> (Arc<InMemoryAccessor>, RevisionCache) {
        let mut fixture = RepositoryFixture::default();
        fixture.revisions = vec![
            RevisionData::new(hash(1), "root"),
            RevisionData::new(hash(2), "second").with_parents(vec![hash(1)]),
            RevisionData::new(hash(3), "third").with_parents(vec![hash(2)]),
        ];
        fixture.heads.insert("main".into(), hash(3));
        let accessor = Arc::new(InMemoryAccessor::from_fixture(fixture));
        let cache = RevisionCache::new(accessor.clone());
        (accessor, cache)
    }

    #[test]
    fn get_or_create_is_identity_preserving() {
        let (_, cache) = setup();
        let a = cache.get_or_create_revision(hash(1));
        let b = cache.get_or_create_revision(hash(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_loaded());
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn unknown_stub_is_none() {
        let (accessor, cache) = setup();
        let stub = cache.get_or_create_revision(hash(0x42));
        assert!(cache.try_get_revision(&hash(0x42)).unwrap().is_none());
        assert!(!stub.is_loaded());
        assert_eq!(accessor.call_count("query_revision"), 1);
    }

    #[test]
    fn stub_is_loaded_once() {
        let (accessor, cache) = setup();
        let stub = cache.get_or_create_revision(hash(2));
        let loaded = cache.try_get_revision(&hash(2)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&stub, &loaded));
        assert!(loaded.is_loaded());
        assert_eq!(loaded.subject(), "second");
        cache.try_get_revision(&hash(2)).unwrap();
        assert_eq!(accessor.call_count("query_revision"), 1);
    }

    #[test]
    fn parents_are_shared_instances() {
        let (_, cache) = setup();
        let third = cache.try_get_revision(&hash(3)).unwrap().unwrap();
        let second = cache.try_get_cached(&hash(2)).unwrap();
        assert!(Arc::ptr_eq(&third.parents()[0], &second));
        assert!(!second.is_loaded());
    }

    #[test]
    fn unknown_revision_is_none() {
        let (_, cache) = setup();
        assert!(cache.try_get_revision(&hash(9)).unwrap().is_none());
    }

    #[test]
    fn other_failures_propagate() {
        let (accessor, cache) = setup();
        accessor.fail_next(
            "query_revision",
            AccessorError::operation("query_revision", "timeout"),
        );
        let err = cache.try_get_revision(&hash(1)).unwrap_err();
        assert!(matches!(err, RevisionError::Accessor(AccessorError::Operation { .. })));
    }

    #[test]
    fn resolve_fills_stubs_and_keeps_loaded() {
        let (_, cache) = setup();
        let stub = cache.get_or_create_revision(hash(2));
        let loaded = cache.resolve_one(RevisionData::new(hash(1), "root"));

        let out = cache.resolve(vec![
            RevisionData::new(hash(2), "second").with_parents(vec![hash(1)]),
            RevisionData::new(hash(1), "rewritten"),
        ]);

        assert!(Arc::ptr_eq(&out[0], &stub));
        assert!(Arc::ptr_eq(&out[1], &loaded));
        assert_eq!(stub.subject(), "second");
        assert_eq!(loaded.subject(), "root");
    }

    #[test]
    fn history_is_resolved_in_order() {
        let (accessor, cache) = setup();
        let history = cache
            .query_history(&QueryRevisionsParameters {
                references: vec!["main".into()],
                max_count: Some(2),
            })
            .unwrap();
        let hashes: Vec<_> = history.iter().map(|r| r.hash()).collect();
        assert_eq!(hashes, vec![hash(3), hash(2)]);
        assert!(history.iter().all(|r| r.is_loaded()));
        assert_eq!(accessor.call_count("query_revision"), 0);
    }

    #[tokio::test]
    async fn async_lookup() {
        let (_, cache) = setup();
        let cache = Arc::new(cache);
        let revision = Arc::clone(&cache)
            .try_get_revision_async(hash(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(revision.subject(), "root");
        assert!(Arc::ptr_eq(&revision, &cache.get_or_create_revision(hash(1))));
    }
}
