//! Classifier configuration, stored as TOML.
//!
//! ```toml
//! worker_threads = 4
//!
//! [incremental]
//! enabled = true
//! max_touched = 10000
//! require_baseline = true
//!
//! [audit]
//! verbose = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracker::IncrementalPolicy;

/// Audit output settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Log revision reports and oversized definitions at debug level.
    pub verbose: bool,
}

/// Top-level classifier configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Worker pool size; 0 lets rayon choose.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default)]
    pub incremental: IncrementalPolicy,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ClassifierConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Write as TOML, replacing the file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Build the worker pool this configuration asks for.
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool, crate::error::ClassifierError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .thread_name(|i| format!("dl-classifier-{i}"))
            .build()
            .map_err(|e| crate::error::ClassifierError::Pool {
                message: e.to_string(),
            })
    }
}
