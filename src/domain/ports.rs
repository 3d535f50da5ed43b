//! Domain Ports - Core trait definitions for the reconciler
//!
//! These types define the boundary between the pure reconciliation engine and
//! the cluster it observes and mutates. Adapters implement [`MutationGateway`]
//! to persist state; watch adapters produce [`WatchSnapshot`]s.

use crate::crd::{Cluster, FileSystemClaim};
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

// =============================================================================
// Storage Nodes
// =============================================================================

/// A node eligible to host storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageNode {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// `metadata.resourceVersion` the labels were read at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl StorageNode {
    pub fn new(name: impl Into<String>, labels: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            labels,
            resource_version: None,
        }
    }

    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.resource_version = Some(version.into());
        self
    }

    /// Operations adding or removing one label.
    ///
    /// The whole label map is replaced, so the patch is guarded by a `test`
    /// on the resourceVersion the labels were read at when it is known. A
    /// concurrent label change then fails the patch instead of being lost.
    pub fn label_patch(&self, key: &str, value: &str, present: bool) -> Vec<JsonPatchOp> {
        let mut ops = Vec::with_capacity(2);
        if let Some(version) = &self.resource_version {
            ops.push(JsonPatchOp::test(
                "/metadata/resourceVersion",
                serde_json::Value::String(version.clone()),
            ));
        }
        ops.push(JsonPatchOp::set_label(&self.labels, key, value, present));
        ops
    }

    /// Check for an exact `key=value` label
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).map(|v| v == value).unwrap_or(false)
    }
}

impl From<&Node> for StorageNode {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name_any(),
            labels: node.labels().clone(),
            resource_version: node.resource_version(),
        }
    }
}

// =============================================================================
// Watch Snapshots
// =============================================================================

/// Latest pushed state of a watched resource list.
///
/// `data` holds the last known-good list; an `error` does not clear it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSnapshot<T> {
    pub loaded: bool,
    pub error: Option<String>,
    pub data: Vec<T>,
}

impl<T> Default for WatchSnapshot<T> {
    fn default() -> Self {
        Self {
            loaded: false,
            error: None,
            data: Vec::new(),
        }
    }
}

impl<T> WatchSnapshot<T> {
    /// A successfully loaded list
    pub fn loaded(data: Vec<T>) -> Self {
        Self {
            loaded: true,
            error: None,
            data,
        }
    }

    /// Record a load failure, keeping the last known-good data
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Replace the data after a successful relist
    pub fn replace(&mut self, data: Vec<T>) {
        self.loaded = true;
        self.error = None;
        self.data = data;
    }
}

// =============================================================================
// JSON Patch
// =============================================================================

/// JSON-Patch operation kinds issued by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Test,
    Replace,
}

/// A single JSON-Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatchOp {
    pub op: PatchOp,
    pub path: String,
    pub value: serde_json::Value,
}

impl JsonPatchOp {
    pub fn replace(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value,
        }
    }

    /// Precondition: fails the whole patch unless `path` equals `value`
    pub fn test(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op: PatchOp::Test,
            path: path.into(),
            value,
        }
    }

    /// Replace the whole label map with `labels` plus or minus one key,
    /// preserving every other label
    pub fn set_label(
        labels: &BTreeMap<String, String>,
        key: &str,
        value: &str,
        present: bool,
    ) -> Self {
        let mut next = labels.clone();
        if present {
            next.insert(key.to_string(), value.to_string());
        } else {
            next.remove(key);
        }
        Self::replace("/metadata/labels", serde_json::json!(next))
    }
}

// =============================================================================
// Remote Mutation Gateway Port
// =============================================================================

/// The only write path into the cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MutationGateway: Send + Sync {
    /// Apply JSON-Patch operations to a node
    async fn patch_node(&self, name: &str, ops: Vec<JsonPatchOp>) -> Result<()>;

    /// Create a filesystem claim
    async fn create_filesystem_claim(&self, claim: FileSystemClaim) -> Result<FileSystemClaim>;

    /// Create the storage cluster
    async fn create_cluster(&self, cluster: Cluster) -> Result<Cluster>;
}

pub type MutationGatewayRef = Arc<dyn MutationGateway>;

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_label_preserves_other_labels() {
        let current = labels(&[("kubernetes.io/hostname", "worker-0")]);
        let op = JsonPatchOp::set_label(&current, "scale.spectrum.ibm.com/role", "storage", true);

        assert_eq!(op.op, PatchOp::Replace);
        assert_eq!(op.path, "/metadata/labels");
        assert_eq!(op.value["kubernetes.io/hostname"], "worker-0");
        assert_eq!(op.value["scale.spectrum.ibm.com/role"], "storage");
    }

    #[test]
    fn test_set_label_removes_key() {
        let current = labels(&[
            ("kubernetes.io/hostname", "worker-0"),
            ("scale.spectrum.ibm.com/role", "storage"),
        ]);
        let op = JsonPatchOp::set_label(&current, "scale.spectrum.ibm.com/role", "storage", false);

        assert!(op.value.get("scale.spectrum.ibm.com/role").is_none());
        assert_eq!(op.value["kubernetes.io/hostname"], "worker-0");
    }

    #[test]
    fn test_patch_op_wire_format() {
        let op = JsonPatchOp::replace("/metadata/labels", serde_json::json!({}));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "replace");
    }

    #[test]
    fn test_snapshot_error_keeps_data() {
        let snapshot = WatchSnapshot::loaded(vec![1, 2, 3]).with_error("watch expired");
        assert!(snapshot.loaded);
        assert_eq!(snapshot.data, vec![1, 2, 3]);
        assert_eq!(snapshot.error.as_deref(), Some("watch expired"));
    }

    #[test]
    fn test_storage_node_label_match() {
        let node = StorageNode::new("worker-1", labels(&[("scale.spectrum.ibm.com/role", "storage")]));
        assert!(node.has_label("scale.spectrum.ibm.com/role", "storage"));
        assert!(!node.has_label("scale.spectrum.ibm.com/role", "client"));
    }

    #[test]
    fn test_label_patch_guards_on_resource_version() {
        let node = StorageNode::new("worker-0", labels(&[("kubernetes.io/hostname", "worker-0")]))
            .with_resource_version("4711");

        let ops = node.label_patch("scale.spectrum.ibm.com/role", "storage", true);

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].op, PatchOp::Test);
        assert_eq!(ops[0].path, "/metadata/resourceVersion");
        assert_eq!(ops[0].value, "4711");
        assert_eq!(ops[1].value["kubernetes.io/hostname"], "worker-0");
        assert_eq!(ops[1].value["scale.spectrum.ibm.com/role"], "storage");
    }

    #[test]
    fn test_label_patch_without_version_is_unguarded() {
        let node = StorageNode::new("worker-0", labels(&[("kubernetes.io/hostname", "worker-0")]));
        let ops = node.label_patch("scale.spectrum.ibm.com/role", "storage", true);

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PatchOp::Replace);
    }
}
