//! Console Configuration
//!
//! Defaults match a stock Fusion Access install. A YAML file can override
//! any subset; CLI flags and environment variables are applied last.

use crate::engine::MinimumRequirements;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single `key=value` node label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPair {
    pub key: String,
    pub value: String,
}

impl LabelPair {
    /// Parse `key=value`
    pub fn parse(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| Error::Configuration(format!("label must be key=value: {}", s)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Configuration(format!("label key is empty: {}", s)));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

impl std::fmt::Display for LabelPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Configuration for the storage console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleConfig {
    /// Namespace holding discovery results, LocalDisks and claims
    pub namespace: String,
    /// Label marking storage-role membership
    pub storage_role_label: LabelPair,
    /// Label selector for nodes eligible to host storage
    pub worker_node_selector: String,
    pub requirements: MinimumRequirements,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            namespace: "ibm-spectrum-scale".to_string(),
            storage_role_label: LabelPair {
                key: "scale.spectrum.ibm.com/role".to_string(),
                value: "storage".to_string(),
            },
            worker_node_selector: "node-role.kubernetes.io/worker".to_string(),
            requirements: MinimumRequirements::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load overrides from a YAML file on top of the defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::Configuration("namespace must not be empty".into()));
        }
        if self.requirements.min_nodes == 0 {
            return Err(Error::Configuration("minimum storage nodes must be at least 1".into()));
        }
        Ok(())
    }
}
