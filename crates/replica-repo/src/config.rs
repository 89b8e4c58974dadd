use std::path::Path;

use serde::{Deserialize, Serialize};

use replica_events::DEFAULT_CAPACITY;

use crate::error::{RepoError, Result};

/// Tunables of a repository handle.
///
/// Every field has a default, so a TOML file only lists what it overrides:
///
/// ```
/// use replica_repo::RepositoryConfig;
///
/// let config = RepositoryConfig::from_toml_str("load_submodules = false").unwrap();
/// assert!(!config.load_submodules);
/// assert_eq!(config.channel_capacity, 256);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Buffer size of every event channel.
    pub channel_capacity: usize,
    /// Whether loading ends with change monitoring enabled.
    pub enable_monitoring: bool,
    pub load_contributors: bool,
    pub load_submodules: bool,
    /// Maximum revisions returned by one history query.
    pub history_limit: Option<usize>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CAPACITY,
            enable_monitoring: true,
            load_contributors: true,
            load_submodules: true,
            history_limit: None,
        }
    }
}

impl RepositoryConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RepoError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RepoError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(RepoError::config("channel_capacity must be greater than zero"));
        }
        if self.history_limit == Some(0) {
            return Err(RepoError::config("history_limit must be greater than zero"));
        }
        Ok(())
    }
}
