//! LocalDisk CRD
//!
//! A device already bound by the storage layer. The resource name is the
//! WWN of the bound device, which is all the reconciler looks at.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Storage Scale local disk binding.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "scale.spectrum.ibm.com",
    version = "v1beta1",
    kind = "LocalDisk",
    plural = "localdisks",
    status = "LocalDiskStatus",
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.node"}"#,
    printcolumn = r#"{"name": "Device", "type": "string", "jsonPath": ".spec.device"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LocalDiskSpec {
    /// Device path on the owning node
    pub device: String,

    /// Node the device was bound through
    pub node: String,

    /// Skip verification of existing data on the device
    #[serde(default)]
    pub existing_data_skip_verify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalDiskStatus {
    /// Disk type reported by the storage layer
    #[serde(default)]
    pub r#type: Option<String>,

    /// Size (human readable)
    #[serde(default)]
    pub size: Option<String>,

    /// Filesystem the disk belongs to, if any
    #[serde(default)]
    pub filesystem: Option<String>,
}

impl LocalDisk {
    /// WWN of the claimed device
    pub fn wwn(&self) -> String {
        self.name_any()
    }
}
