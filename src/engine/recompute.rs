//! Shared LUN recomputation
//!
//! Runs the catalog, intersection and exclusion stages as one pure function
//! of the current snapshots, memoized by structural equality of its inputs.
//! Equal inputs keep the existing candidate list (and its selection flags);
//! any change rebuilds the list from scratch with nothing selected.

use super::catalog::{build_catalog, NodeDiscoveryResult};
use super::exclusion::exclude_wwns;
use super::intersection::intersect_shared;
use super::lun::Lun;
use super::selection::LunSelection;
use crate::crd::{LocalDisk, LocalVolumeDiscoveryResult};
use std::collections::BTreeSet;
use tracing::debug;

/// The projection of cluster state the candidate list depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedLunInputs {
    /// Discovery results of the selected storage nodes, ordered by node name
    pub results: Vec<NodeDiscoveryResult>,
    /// Number of selected storage nodes
    pub node_count: usize,
    /// WWNs already bound by LocalDisks
    pub claimed: BTreeSet<String>,
}

impl SharedLunInputs {
    /// Project raw snapshots onto the inputs of the engine.
    ///
    /// Results from nodes outside `storage_nodes` are ignored. Sorting by
    /// node name makes the representative of each shared WWN the report of
    /// the lowest-named node.
    pub fn project(
        discovery: &[LocalVolumeDiscoveryResult],
        local_disks: &[LocalDisk],
        storage_nodes: &[String],
    ) -> Self {
        let mut results: Vec<NodeDiscoveryResult> = discovery
            .iter()
            .filter(|r| storage_nodes.iter().any(|n| n == r.node_name()))
            .map(NodeDiscoveryResult::from)
            .collect();
        results.sort_by(|a, b| a.node_name.cmp(&b.node_name));

        Self {
            results,
            node_count: storage_nodes.len(),
            claimed: local_disks.iter().map(LocalDisk::wwn).collect(),
        }
    }
}

/// Compute the candidate LUN list, all unselected
pub fn compute_shared_luns(inputs: &SharedLunInputs) -> Vec<Lun> {
    let catalog = build_catalog(&inputs.results);
    let shared = intersect_shared(&catalog, inputs.node_count);
    exclude_wwns(&shared, &inputs.claimed)
        .into_iter()
        .map(Lun::from)
        .collect()
}

/// Memoizing holder of the candidate list.
#[derive(Debug, Default)]
pub struct SharedLunRecomputer {
    last: Option<SharedLunInputs>,
    selection: LunSelection,
    rebuilds: u64,
}

impl SharedLunRecomputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute for `inputs`. Returns true when the list was rebuilt.
    pub fn recompute(&mut self, inputs: SharedLunInputs) -> bool {
        if self.last.as_ref() == Some(&inputs) {
            return false;
        }

        let luns = compute_shared_luns(&inputs);
        debug!(
            nodes = inputs.node_count,
            claimed = inputs.claimed.len(),
            shared = luns.len(),
            "Rebuilt shared LUN candidates"
        );

        self.selection = LunSelection::new(luns);
        self.last = Some(inputs);
        self.rebuilds += 1;
        true
    }

    pub fn selection(&self) -> &LunSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut LunSelection {
        &mut self.selection
    }

    /// Number of rebuilds so far
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}
