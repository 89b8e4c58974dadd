//! Typed boundary to the external repository tool.
//!
//! replica never invokes the external tool or parses its output. It depends
//! only on the operations of [`RepositoryAccessor`] and on the shape of the
//! data records those operations return. How commands are built, run, and
//! parsed is the accessor implementation's business.
//!
//! # Modules
//!
//! - [`records`] — Data records returned by queries ([`BranchData`], [`RevisionData`], ...)
//! - [`params`] — Parameters for queries and mutations
//! - [`traits`] — The [`RepositoryAccessor`] trait
//! - [`error`] — [`AccessorError`], separating named domain conflicts from generic failures
//! - [`memory`] — [`InMemoryAccessor`], a fixture-driven backend with a call journal

pub mod error;
pub mod memory;
pub mod params;
pub mod records;
pub mod traits;

pub use error::{AccessorError, Result};
pub use memory::{CallObserver, InMemoryAccessor, RepositoryFixture};
pub use params::{
    BranchQueryMode, BranchRestriction, CreateBranchParameters, CreateTagParameters,
    DeleteBranchParameters, FetchParameters, MergeParameters, PullParameters,
    QueryBranchesParameters, QueryRevisionsParameters, ResetMode, ResetParameters,
};
pub use records::{
    BranchData, ConfigParameterData, ConfigSource, HeadData, NoteData, ReferencesData,
    ReflogRecordData, RemoteData, RepositoryStateData, RevisionData, StashedStateData,
    StatusData, SubmoduleData, TagData, TagKind, UserData,
};
pub use traits::RepositoryAccessor;
