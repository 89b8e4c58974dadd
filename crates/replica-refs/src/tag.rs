//! Tags.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use replica_accessor::{AccessorError, CreateTagParameters, TagData, TagKind};
use replica_cache::{CacheObject, Lifetime, MergeSummary, ObjectCollection};
use replica_events::ChangeCategories;
use replica_types::{ReferenceKey, ReferenceType};

use crate::context::RefsContext;
use crate::error::Result;
use crate::names::validate_tag_name;
use crate::pointer::Pointer;
use crate::reference::{Reference, ReferenceCore};

struct Annotation {
    kind: TagKind,
    message: Option<String>,
}

/// A tag (`refs/tags/...`), peeled to the commit it marks.
pub struct Tag {
    core: ReferenceCore,
    annotation: RwLock<Annotation>,
}

impl Tag {
    pub(crate) fn from_data(context: &Arc<RefsContext>, data: TagData) -> Arc<Self> {
        let revision = context.revisions().get_or_create_revision(data.target);
        Arc::new(Self {
            core: ReferenceCore::new(
                context,
                ReferenceKey::from_short_name(ReferenceType::Tag, &data.name),
                Pointer::Revision(revision),
            ),
            annotation: RwLock::new(Annotation {
                kind: data.kind,
                message: data.message,
            }),
        })
    }

    pub(crate) fn update(&self, data: TagData) {
        {
            let mut annotation = self.annotation.write().unwrap_or_else(PoisonError::into_inner);
            annotation.kind = data.kind;
            annotation.message = data.message;
        }
        let revision = self
            .core
            .context()
            .revisions()
            .get_or_create_revision(data.target);
        self.core.set_pointer(Pointer::Revision(revision));
    }

    pub fn kind(&self) -> TagKind {
        self.annotation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .kind
    }

    /// Message of an annotated tag.
    pub fn message(&self) -> Option<String> {
        self.annotation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .message
            .clone()
    }
}

impl Reference for Tag {
    fn core(&self) -> &ReferenceCore {
        &self.core
    }
}

impl CacheObject for Tag {
    fn name(&self) -> String {
        self.core.short_name()
    }

    fn lifetime(&self) -> &Lifetime {
        self.core.lifetime()
    }

    fn on_deleted(&self) {
        self.core.unlink();
    }

    fn on_revived(&self) {
        self.core.link();
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt(f)
    }
}

/// Cached tags.
#[derive(Debug)]
pub struct Tags {
    context: Arc<RefsContext>,
    items: ObjectCollection<Tag>,
}

impl Tags {
    pub fn new(context: &Arc<RefsContext>) -> Self {
        Self {
            context: Arc::clone(context),
            items: ObjectCollection::with_capacity(context.capacity()),
        }
    }

    pub fn collection(&self) -> &ObjectCollection<Tag> {
        &self.items
    }

    pub fn try_get_item(&self, name: &str) -> Option<Arc<Tag>> {
        self.items.try_get_item(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.items.names()
    }

    pub fn count(&self) -> usize {
        self.items.count()
    }

    pub fn all(&self) -> Vec<Arc<Tag>> {
        self.items.items()
    }

    pub fn merge_records(&self, records: Vec<TagData>) -> MergeSummary {
        self.items.merge(
            records,
            |data| data.name.clone(),
            |tag, data| tag.update(data),
            |data| Tag::from_data(&self.context, data),
        )
    }

    pub fn refresh(&self) -> Result<MergeSummary> {
        let records = self.context.accessor().query_tags()?;
        Ok(self.merge_records(records))
    }

    /// Create a tag on `target` (hash or reference name). A message makes it
    /// an annotated tag.
    pub fn create(
        &self,
        name: &str,
        target: &str,
        message: Option<&str>,
    ) -> Result<Arc<Tag>> {
        validate_tag_name(name)?;
        let _scope = self.context.gate().suppress(ChangeCategories::TAGS);
        self.context.accessor().create_tag(&CreateTagParameters {
            name: name.to_string(),
            target: target.to_string(),
            message: message.map(str::to_string),
        })?;
        let data = self
            .context
            .accessor()
            .query_tag(name)?
            .ok_or_else(|| AccessorError::TagNotFound {
                name: name.to_string(),
            })?;
        info!(name, "tag created");
        Ok(self.items.merge_item(
            name,
            data,
            |tag, data| tag.update(data),
            |data| Tag::from_data(&self.context, data),
        ))
    }

    pub fn delete(&self, tag: &Tag) -> Result<()> {
        let name = tag.name();
        tag.lifetime().ensure_alive(&name)?;
        let _scope = self.context.gate().suppress(ChangeCategories::TAGS);
        self.context.accessor().delete_tag(&name)?;
        self.items.remove(&name);
        info!(name = %name, "tag deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_accessor::{InMemoryAccessor, RepositoryFixture};
    use replica_events::RefreshRequest;
    use replica_types::Hash;

    use crate::error::RefError;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 20])
    }

    #[test]
    fn create_withholds_tag_notifications_until_done() {
        let mut fixture = RepositoryFixture::default();
        fixture.heads.insert("main".into(), hash(1));
        let accessor = Arc::new(InMemoryAccessor::from_fixture(fixture));
        let context = RefsContext::for_accessor(accessor.clone());
        let tags = Tags::new(&context);
        context.gate().enable_monitoring();
        let mut requests = context.gate().subscribe();
        let watcher = Arc::downgrade(&context);
        accessor.on_call(move |operation| {
            if let Some(context) = watcher.upgrade() {
                match operation {
                    "create_tag" => {
                        context.gate().notify(ChangeCategories::TAGS | ChangeCategories::HEAD);
                    }
                    "query_tags" => {
                        context.gate().notify(ChangeCategories::TAGS);
                    }
                    _ => {}
                }
            }
        });

        tags.create("v2.0", "main", None).unwrap();

        let received: Vec<RefreshRequest> =
            std::iter::from_fn(|| requests.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                RefreshRequest {
                    categories: ChangeCategories::HEAD,
                    catch_up: false
                },
                RefreshRequest {
                    categories: ChangeCategories::TAGS,
                    catch_up: true
                },
            ]
        );
    }

    fn setup() -> (Arc<InMemoryAccessor>, Tags) {
        let mut fixture = RepositoryFixture::default();
        fixture.heads.insert("main".into(), hash(1));
        fixture.tags.push(TagData::lightweight("v1.0", hash(1)));
        let accessor = Arc::new(InMemoryAccessor::from_fixture(fixture));
        let tags = Tags::new(&RefsContext::for_accessor(accessor.clone()));
        tags.refresh().unwrap();
        (accessor, tags)
    }

    #[test]
    fn annotated_tag_keeps_message() {
        let (_, tags) = setup();
        let tag = tags.create("v2.0", "main", Some("second release")).unwrap();
        assert_eq!(tag.kind(), TagKind::Annotated);
        assert_eq!(tag.message().as_deref(), Some("second release"));
        assert_eq!(tag.revision().unwrap().hash(), hash(1));
    }

    #[test]
    fn duplicate_tag_is_domain_conflict() {
        let (_, tags) = setup();
        let err = tags.create("v1.0", "main", None).unwrap_err();
        assert_eq!(
            err,
            RefError::Accessor(AccessorError::TagAlreadyExists { name: "v1.0".into() })
        );
        assert_eq!(tags.count(), 1);
    }

    #[test]
    fn delete_then_external_recreate_revives() {
        let (accessor, tags) = setup();
        let tag = tags.try_get_item("v1.0").unwrap();
        tags.delete(&tag).unwrap();
        assert!(tag.is_deleted());

        accessor.modify(|f| f.tags.push(TagData::lightweight("v1.0", hash(1))));
        tags.refresh().unwrap();
        let again = tags.try_get_item("v1.0").unwrap();
        assert!(Arc::ptr_eq(&tag, &again));
        assert!(!again.is_deleted());
    }
}
