//! Device Catalog Builder
//!
//! Flattens per-node discovery reports into one list of device occurrences
//! tagged with the reporting node. No deduplication happens here.

use crate::crd::{DiscoveredDevice, LocalVolumeDiscoveryResult};
use serde::{Deserialize, Serialize};

/// Devices reported by a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDiscoveryResult {
    pub node_name: String,
    pub discovered_devices: Vec<DiscoveredDevice>,
}

impl From<&LocalVolumeDiscoveryResult> for NodeDiscoveryResult {
    fn from(result: &LocalVolumeDiscoveryResult) -> Self {
        Self {
            node_name: result.node_name().to_string(),
            discovered_devices: result.discovered_devices().to_vec(),
        }
    }
}

/// One device occurrence as seen from one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatEntry {
    pub node_name: String,
    pub path: String,
    pub wwn: String,
    pub size: u64,
}

impl FlatEntry {
    fn from_device(node_name: &str, device: &DiscoveredDevice) -> Self {
        Self {
            node_name: node_name.to_string(),
            path: device.path.clone(),
            wwn: device.wwn.clone(),
            size: device.size,
        }
    }
}

/// Flatten discovery results, preserving every occurrence in input order
pub fn build_catalog(results: &[NodeDiscoveryResult]) -> Vec<FlatEntry> {
    results
        .iter()
        .flat_map(|result| {
            result
                .discovered_devices
                .iter()
                .map(move |device| FlatEntry::from_device(&result.node_name, device))
        })
        .collect()
}
