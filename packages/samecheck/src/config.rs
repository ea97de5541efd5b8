//! Run configuration.
//!
//! A `CheckConfig` can be read from a JSON file; command-line flags then
//! override individual fields. `validate()` runs at the boundary before
//! any host is started.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compare::{CompareOptions, FailurePolicy, MatchStrategy};
use crate::error::{CheckError, Result};
use crate::graph::PartitionPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Graph whose edges must all be present (A).
    pub graph: PathBuf,
    /// Graph searched for A's edges (B).
    pub other_graph: PathBuf,
    /// Number of cooperating hosts.
    pub num_hosts: u32,
    pub partition: PartitionPolicy,
    pub compare: CompareOptions,
    /// Rayon threads per host. None = derived from detected CPUs.
    pub threads_per_host: Option<usize>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            graph: PathBuf::new(),
            other_graph: PathBuf::new(),
            num_hosts: 1,
            partition: PartitionPolicy::default(),
            compare: CompareOptions::default(),
            threads_per_host: None,
        }
    }
}

impl CheckConfig {
    pub fn new(graph: impl Into<PathBuf>, other_graph: impl Into<PathBuf>) -> Self {
        Self {
            graph: graph.into(),
            other_graph: other_graph.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CheckError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.graph.as_os_str().is_empty() || self.other_graph.as_os_str().is_empty() {
            return Err(CheckError::InvalidConfig(
                "both graph paths are required".to_string(),
            ));
        }
        if self.num_hosts == 0 {
            return Err(CheckError::InvalidConfig("num_hosts must be > 0".to_string()));
        }
        if self.threads_per_host == Some(0) {
            return Err(CheckError::InvalidConfig(
                "threads_per_host must be > 0".to_string(),
            ));
        }
        if let FailurePolicy::CollectAll { limit: 0 } = self.compare.failure_policy {
            return Err(CheckError::InvalidConfig(
                "collect-all limit must be > 0".to_string(),
            ));
        }
        if let MatchStrategy::Auto { threshold: 0 } = self.compare.strategy {
            return Err(CheckError::InvalidConfig(
                "index threshold must be > 0 (use the indexed strategy instead)".to_string(),
            ));
        }
        Ok(())
    }
}
