//! Fixtures shared by the tests of this crate.

use std::sync::Arc;

use replica_accessor::{
    ConfigParameterData, ConfigSource, InMemoryAccessor, RemoteData, RepositoryFixture,
    RevisionData, TagData, UserData,
};
use replica_types::Hash;

pub fn hash(byte: u8) -> Hash {
    Hash::from_bytes([byte; 20])
}

/// `main` at 2 (child of 1), `origin/main` and tag `v1` at 1, one remote,
/// one contributor, user identity configured. No stash.
pub fn fixture() -> RepositoryFixture {
    let mut fixture = RepositoryFixture::default();
    fixture.revisions = vec![
        RevisionData::new(hash(1), "initial"),
        RevisionData::new(hash(2), "second").with_parents(vec![hash(1)]),
        RevisionData::new(hash(3), "third").with_parents(vec![hash(2)]),
    ];
    fixture.heads.insert("main".into(), hash(2));
    fixture.remote_branches.insert("origin/main".into(), hash(1));
    fixture.tags.push(TagData::lightweight("v1", hash(1)));
    fixture.config = vec![
        ConfigParameterData {
            name: "user.name".into(),
            value: "Ada".into(),
            source: ConfigSource::User,
        },
        ConfigParameterData {
            name: "user.email".into(),
            value: "ada@example.com".into(),
            source: ConfigSource::User,
        },
    ];
    fixture.remotes = vec![RemoteData {
        name: "origin".into(),
        fetch_url: "https://example.com/repo.git".into(),
        push_url: None,
    }];
    fixture.users = vec![UserData {
        name: "Ada".into(),
        email: "ada@example.com".into(),
        commits: 2,
    }];
    fixture
}

pub fn accessor(fixture: RepositoryFixture) -> Arc<InMemoryAccessor> {
    Arc::new(InMemoryAccessor::from_fixture(fixture))
}
