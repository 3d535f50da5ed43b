//! Candidate LUN
//!
//! A shared, unclaimed device offered for selection.

use super::catalog::FlatEntry;
use serde::{Deserialize, Serialize};

/// A selectable shared device.
///
/// `path` and `node_name` come from the representative node's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lun {
    pub wwn: String,
    pub path: String,
    pub node_name: String,
    /// Human readable capacity
    pub capacity: String,
    pub size_bytes: u64,
    pub is_selected: bool,
}

impl From<FlatEntry> for Lun {
    fn from(entry: FlatEntry) -> Self {
        Self {
            capacity: format_capacity(entry.size),
            size_bytes: entry.size,
            wwn: entry.wwn,
            path: entry.path,
            node_name: entry.node_name,
            is_selected: false,
        }
    }
}

/// Format bytes as a human-readable binary size
pub fn format_capacity(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;
    const PIB: u64 = TIB * 1024;

    if bytes >= PIB {
        format!("{:.2} PiB", bytes as f64 / PIB as f64)
    } else if bytes >= TIB {
        format!("{:.2} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
