//! LocalVolumeDiscoveryResult CRD
//!
//! Published by the device finder daemonset, one per node. Lists every block
//! device the node can see. Read-only to the reconciler.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// LocalVolumeDiscoveryResult CRD
// =============================================================================

/// Per-node device discovery report.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fusion.storage.openshift.io",
    version = "v1alpha1",
    kind = "LocalVolumeDiscoveryResult",
    plural = "localvolumediscoveryresults",
    shortname = "lvdr",
    status = "LocalVolumeDiscoveryResultStatus",
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.nodeName"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LocalVolumeDiscoveryResultSpec {
    /// Name of the node that produced this report
    pub node_name: String,
}

/// Discovery status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalVolumeDiscoveryResultStatus {
    /// Devices visible from the node
    #[serde(default)]
    pub discovered_devices: Vec<DiscoveredDevice>,

    /// When the device finder last scanned
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub discovered_time_stamp: Option<DateTime<Utc>>,
}

/// A block device as reported by one node.
///
/// `wwn` is the cross-node identity; `path` may differ between nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    /// Device path on the reporting node (e.g. /dev/sdb)
    pub path: String,

    /// World Wide Name
    #[serde(rename = "WWN")]
    pub wwn: String,

    /// Size in bytes
    #[serde(default)]
    pub size: u64,

    /// Stable by-id path, if any
    #[serde(default, rename = "deviceID", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// Filesystem signature found on the device, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fstype: Option<String>,
}

// =============================================================================
// Implementations
// =============================================================================

impl LocalVolumeDiscoveryResult {
    /// Get the reporting node name
    pub fn node_name(&self) -> &str {
        &self.spec.node_name
    }

    /// Devices reported so far (empty until the first scan completes)
    pub fn discovered_devices(&self) -> &[DiscoveredDevice] {
        self.status
            .as_ref()
            .map(|s| s.discovered_devices.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_wire_names() {
        let raw = serde_json::json!({
            "path": "/dev/sdb",
            "WWN": "uuid.5000c500a1b2c3d4",
            "size": 10737418240u64,
            "deviceID": "/dev/disk/by-id/wwn-0x5000c500a1b2c3d4"
        });
        let device: DiscoveredDevice = serde_json::from_value(raw).unwrap();
        assert_eq!(device.wwn, "uuid.5000c500a1b2c3d4");
        assert_eq!(device.size, 10 * 1024 * 1024 * 1024);
        assert!(device.model.is_none());
    }

    #[test]
    fn test_devices_default_empty_without_status() {
        let result = LocalVolumeDiscoveryResult::new(
            "discovery-result-worker-0",
            LocalVolumeDiscoveryResultSpec {
                node_name: "worker-0".into(),
            },
        );
        assert_eq!(result.node_name(), "worker-0");
        assert!(result.discovered_devices().is_empty());
    }
}
