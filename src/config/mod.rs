//! Store configuration.
//!
//! Hierarchical loading with priority:
//! 1. Crate defaults (hardcoded)
//! 2. Optional TOML config file
//! 3. Environment variables (highest priority, `METAKV_` prefix)

mod policy;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod policy_test;

pub use policy::*;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::DEFAULT_ROOT;

/// Configuration for one store instance.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Root prefix all store paths are resolved under
    #[serde(default = "default_root")]
    pub root: String,

    /// Watch session tuning
    #[serde(default)]
    pub watch: WatchPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            watch: WatchPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration, merging sources with priority:
    /// 1. Defaults
    /// 2. `file`, when given (must exist)
    /// 3. Environment variables: `METAKV_ROOT`,
    ///    `METAKV_WATCH__POLL_INTERVAL_MS`, ...
    pub fn load(file: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("METAKV").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Returns a copy rooted under a different prefix. Handy for
    /// carving per-cell stores out of one loaded configuration.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}
