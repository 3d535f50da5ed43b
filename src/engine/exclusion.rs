//! Claimed-Device Exclusion Filter
//!
//! Drops devices already bound to a LocalDisk. Membership is plain set
//! exclusion on the WWN.

use super::catalog::FlatEntry;
use crate::crd::LocalDisk;
use std::collections::BTreeSet;
use tracing::debug;

/// Drop every entry whose WWN names an existing LocalDisk
pub fn exclude_claimed(entries: &[FlatEntry], claimed: &[LocalDisk]) -> Vec<FlatEntry> {
    let claimed: BTreeSet<String> = claimed.iter().map(LocalDisk::wwn).collect();
    exclude_wwns(entries, &claimed)
}

/// Drop every entry whose WWN is in `claimed`
pub fn exclude_wwns(entries: &[FlatEntry], claimed: &BTreeSet<String>) -> Vec<FlatEntry> {
    entries
        .iter()
        .filter(|entry| {
            let keep = !claimed.contains(&entry.wwn);
            if !keep {
                debug!(wwn = %entry.wwn, node = %entry.node_name, "Device already claimed by a LocalDisk");
            }
            keep
        })
        .cloned()
        .collect()
}
