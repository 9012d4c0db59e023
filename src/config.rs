//! Processing configuration for symproc
//!
//! Defaults suit a build-tool integration: incremental on, sequential processors, a generous round cap.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::NullabilityPolicy;

/// File name of the dependency manifest inside `caches_dir`.
pub const MANIFEST_FILE: &str = "symproc-manifest.json";
/// File name of the incremental log inside `caches_dir`.
pub const INCREMENTAL_LOG_FILE: &str = "symproc-incremental.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid processor option `{0}` (expected key=value)")]
    Option(String),
    #[error("max_rounds must be at least 1")]
    ZeroRounds,
}

/// Processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Rounds after which processing only continues while the deferred set shrinks
    pub max_rounds: u32,
    /// Plan incremental builds from the previous manifest
    pub incremental: bool,
    /// Write plan explanations to the incremental log
    pub incremental_log: bool,
    /// Run processors of one round on a worker pool
    pub parallel: bool,
    /// Treat processor warnings as errors
    pub all_warnings_as_errors: bool,
    /// How platform nullability surfaces in resolved types
    pub nullability_policy: NullabilityPolicy,
    /// Root directory for generated files
    pub output_dir: PathBuf,
    /// Directory holding the manifest and incremental log
    pub caches_dir: PathBuf,
    /// Options passed to processors (`-A key=value`)
    pub processor_options: BTreeMap<String, String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_rounds: 100,
            incremental: true,
            incremental_log: false,
            parallel: false,
            all_warnings_as_errors: false,
            nullability_policy: NullabilityPolicy::Flexible,
            output_dir: PathBuf::from("generated"),
            caches_dir: PathBuf::from(".symproc"),
            processor_options: BTreeMap::new(),
        }
    }
}

impl ProcessingConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.caches_dir.join(MANIFEST_FILE)
    }

    pub fn incremental_log_path(&self) -> PathBuf {
        self.caches_dir.join(INCREMENTAL_LOG_FILE)
    }

    /// Set the round cap
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn with_incremental_log(mut self, enabled: bool) -> Self {
        self.incremental_log = enabled;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_all_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.all_warnings_as_errors = enabled;
        self
    }

    pub fn with_nullability_policy(mut self, policy: NullabilityPolicy) -> Self {
        self.nullability_policy = policy;
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the caches directory
    pub fn with_caches_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.caches_dir = dir.into();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.processor_options.insert(key.into(), value.into());
        self
    }

    /// Parse and add a `key=value` processor option.
    pub fn with_option_pair(self, pair: &str) -> Result<Self, ConfigError> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(self.with_option(key.trim(), value.trim())),
            _ => Err(ConfigError::Option(pair.to_string())),
        }
    }
}
