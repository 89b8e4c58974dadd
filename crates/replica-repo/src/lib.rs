//! Repository handle for replica.
//!
//! A [`Repository`] bundles every cache mirrored from one external
//! repository: references and `HEAD`, the revision cache, stash, notes,
//! remotes, submodules, contributors, configuration and working tree status.
//! [`RepositoryLoader`] builds one from nothing in a fixed, cancellable,
//! progress-reporting sequence.
//!
//! # Modules
//!
//! - [`repository`] — [`Repository`]: refresh by change category, remote operations, disposal
//! - [`loader`] — [`RepositoryLoader`] and [`LoadProgress`]
//! - [`records`] — Record-backed collections ([`Remotes`], [`Notes`], [`Users`], ...)
//! - [`stash`] — [`StashedStates`]
//! - [`status`] — [`Status`] and [`RepositoryState`]
//! - [`config`] — [`RepositoryConfig`], loadable from TOML
//! - [`cancel`] — [`CancellationToken`]
//! - [`error`] — [`RepoError`]

pub mod cancel;
pub mod config;
pub mod error;
pub mod loader;
pub mod records;
pub mod repository;
pub mod stash;
pub mod status;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use config::RepositoryConfig;
pub use error::{RepoError, Result};
pub use loader::{LoadProgress, ProgressReporter, RepositoryLoader};
pub use records::{
    ConfigParameter, ConfigParameters, Contributor, NamedRecord, Note, Notes, Record,
    RecordCollection, Remote, Remotes, Submodule, Submodules, Users,
};
pub use repository::Repository;
pub use stash::{StashedState, StashedStates};
pub use status::{RepositoryState, Status};
