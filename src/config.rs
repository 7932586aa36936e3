//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. [`GraphConfig::load_or_default`] looks for an explicit
//! path first, then `$CONFIG_DIR/skein/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// What the traversal does when one branch hits a routing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchFailure {
    /// Drop the branch and keep exploring its siblings.
    #[default]
    Prune,
    /// Fail the whole query.
    Abort,
}

/// Tunables shared by every service in a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Policy for `NotFound` / `ConnectionFailure` met mid-traversal.
    pub branch_failure: BranchFailure,
    /// Explore sibling edges on the rayon pool once a node has at least this
    /// many outgoing edges. `None` keeps traversal sequential.
    pub parallel_fanout_threshold: Option<usize>,
    /// Maximum number of cached sessions per connection manager.
    pub session_cache_capacity: usize,
    /// Default `tracing` filter used by the CLI.
    pub log_level: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            branch_failure: BranchFailure::Prune,
            parallel_fanout_threshold: None,
            session_cache_capacity: 64,
            log_level: "warn".to_string(),
        }
    }
}

impl GraphConfig {
    /// Any branch-local failure aborts the query.
    pub fn strict() -> Self {
        Self {
            branch_failure: BranchFailure::Abort,
            ..Self::default()
        }
    }

    /// Sibling edges are explored concurrently from `threshold` edges up.
    pub fn parallel(threshold: usize) -> Self {
        Self {
            parallel_fanout_threshold: Some(threshold.max(1)),
            ..Self::default()
        }
    }

    /// Sets the branch failure policy.
    pub fn with_branch_failure(mut self, policy: BranchFailure) -> Self {
        self.branch_failure = policy;
        self
    }

    /// Sets the session cache bound.
    pub fn with_session_cache_capacity(mut self, capacity: usize) -> Self {
        self.session_cache_capacity = capacity;
        self
    }

    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|err| GraphError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|err| GraphError::Config(format!("{}: {err}", path.display())))
    }

    /// Loads `explicit` if given, else the per-user config file if it
    /// exists, else the defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.session_cache_capacity == 0 {
            return Err(GraphError::Config(
                "session_cache_capacity must be at least 1".into(),
            ));
        }
        if self.parallel_fanout_threshold == Some(0) {
            return Err(GraphError::Config(
                "parallel_fanout_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// `$CONFIG_DIR/skein/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("skein").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(GraphConfig::from_toml_str("").unwrap(), GraphConfig::default());
    }

    #[test]
    fn fields_parse_and_unknown_keys_fail() {
        let config = GraphConfig::from_toml_str(
            "branch_failure = \"abort\"\nparallel_fanout_threshold = 8\n",
        )
        .unwrap();
        assert_eq!(config.branch_failure, BranchFailure::Abort);
        assert_eq!(config.parallel_fanout_threshold, Some(8));
        assert_eq!(config.session_cache_capacity, 64);

        assert!(GraphConfig::from_toml_str("cache = 3").is_err());
        assert!(GraphConfig::from_toml_str("session_cache_capacity = 0").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = \"debug\"\n").unwrap();
        let config = GraphConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(GraphConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn builders_agree_with_the_toml_form() {
        let built = GraphConfig::parallel(4)
            .with_branch_failure(BranchFailure::Abort)
            .with_session_cache_capacity(8);
        let parsed = GraphConfig::from_toml_str(
            "branch_failure = \"abort\"\nparallel_fanout_threshold = 4\nsession_cache_capacity = 8\n",
        )
        .unwrap();
        assert_eq!(built, parsed);
        assert_eq!(
            GraphConfig::default().with_branch_failure(BranchFailure::Abort),
            GraphConfig::strict()
        );
    }
}
