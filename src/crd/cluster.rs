//! Storage Scale Cluster CRD
//!
//! The cluster-wide singleton that turns the storage-role nodes into a
//! Storage Scale cluster. Creating it is the aggregate action gated by the
//! minimum-requirements check.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name the Storage Scale operator expects for the singleton cluster
pub const STORAGE_CLUSTER_NAME: &str = "ibm-spectrum-scale";

// =============================================================================
// Cluster CRD
// =============================================================================

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "scale.spectrum.ibm.com",
    version = "v1beta1",
    kind = "Cluster",
    plural = "clusters",
    status = "ClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub license: LicenseSpec,

    /// Where the core daemons run
    pub daemon: DaemonSpec,

    /// Performance monitoring collector placement
    #[serde(default)]
    pub pmcollector: Option<NodeSelectorSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSpec {
    pub accept: bool,
    pub license: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSpec {
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorSpec {
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub conditions: Vec<serde_json::Value>,
}

impl Cluster {
    /// Build the singleton cluster scheduled onto nodes carrying the
    /// storage-role label
    pub fn for_storage_role(namespace: &str, role_key: &str, role_value: &str) -> Self {
        let mut selector = BTreeMap::new();
        selector.insert(role_key.to_string(), role_value.to_string());

        let mut cluster = Cluster::new(
            STORAGE_CLUSTER_NAME,
            ClusterSpec {
                license: LicenseSpec {
                    accept: true,
                    license: "data-management".to_string(),
                },
                daemon: DaemonSpec {
                    node_selector: selector.clone(),
                },
                pmcollector: Some(NodeSelectorSpec {
                    node_selector: selector,
                }),
            },
        );
        cluster.metadata.namespace = Some(namespace.to_string());
        cluster
    }
}
