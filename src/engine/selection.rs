//! Selection State Machine
//!
//! LUN selection is a pure local toggle. Node selection mirrors the
//! storage-role label and adds a pending state while a label patch is in
//! flight; it only flips once the patch outcome is known.

use super::lun::Lun;
use crate::domain::ports::StorageNode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// LUN Selection
// =============================================================================

/// The candidate LUN list and its selection flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LunSelection {
    luns: Vec<Lun>,
}

impl LunSelection {
    pub fn new(luns: Vec<Lun>) -> Self {
        Self { luns }
    }

    pub fn luns(&self) -> &[Lun] {
        &self.luns
    }

    pub fn len(&self) -> usize {
        self.luns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.luns.is_empty()
    }

    /// Select or deselect one LUN. Returns false for an unknown WWN.
    pub fn set_selected(&mut self, wwn: &str, selected: bool) -> bool {
        match self.luns.iter_mut().find(|lun| lun.wwn == wwn) {
            Some(lun) => {
                lun.is_selected = selected;
                true
            }
            None => false,
        }
    }

    /// Apply the same flag to every candidate
    pub fn set_all_selected(&mut self, selected: bool) {
        for lun in &mut self.luns {
            lun.is_selected = selected;
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &Lun> {
        self.luns.iter().filter(|lun| lun.is_selected)
    }

    pub fn selected_wwns(&self) -> Vec<String> {
        self.selected().map(|lun| lun.wwn.clone()).collect()
    }
}

// =============================================================================
// Node Selection
// =============================================================================

/// Storage-role membership of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum NodeRoleState {
    Unselected,
    Selected,
    /// A label patch is outstanding
    Pending { previous: bool, target: bool },
}

impl NodeRoleState {
    pub(crate) fn from_flag(selected: bool) -> Self {
        if selected {
            NodeRoleState::Selected
        } else {
            NodeRoleState::Unselected
        }
    }

    /// Membership as committed in the cluster. Pending nodes keep their
    /// pre-request value.
    pub fn is_selected(&self) -> bool {
        match self {
            NodeRoleState::Selected => true,
            NodeRoleState::Unselected => false,
            NodeRoleState::Pending { previous, .. } => *previous,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, NodeRoleState::Pending { .. })
    }
}

impl std::fmt::Display for NodeRoleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRoleState::Unselected => write!(f, "unselected"),
            NodeRoleState::Selected => write!(f, "selected"),
            NodeRoleState::Pending { .. } => write!(f, "selection-pending"),
        }
    }
}

/// Role state of every storage-eligible node, keyed by node name.
#[derive(Debug, Clone, Default)]
pub struct NodeSelection {
    states: BTreeMap<String, NodeRoleState>,
    /// resourceVersion per node that predates our last applied patch
    superseded: BTreeMap<String, String>,
}

impl NodeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh from the latest node snapshot. Pending nodes are left alone;
    /// nodes that disappeared are dropped unless a patch is outstanding.
    /// A node still at a superseded resourceVersion keeps its settled state
    /// until a newer read arrives.
    pub fn sync(&mut self, nodes: &[StorageNode], role_key: &str, role_value: &str) {
        let mut next = BTreeMap::new();
        for node in nodes {
            let current = self.states.get(&node.name).copied();
            let state = match current {
                Some(pending @ NodeRoleState::Pending { .. }) => pending,
                Some(settled) if self.is_superseded(node) => settled,
                _ => {
                    self.superseded.remove(&node.name);
                    NodeRoleState::from_flag(node.has_label(role_key, role_value))
                }
            };
            next.insert(node.name.clone(), state);
        }
        for (name, state) in &self.states {
            if state.is_pending() && !next.contains_key(name) {
                next.insert(name.clone(), *state);
            }
        }
        self.superseded.retain(|name, _| next.contains_key(name));
        self.states = next;
    }

    fn is_superseded(&self, node: &StorageNode) -> bool {
        match (self.superseded.get(&node.name), &node.resource_version) {
            (Some(stale), Some(seen)) => stale == seen,
            _ => false,
        }
    }

    /// Ignore snapshots of `node` still at `version` in later syncs.
    /// Called after a patch that was built from a read at `version`.
    pub fn supersede(&mut self, node: &str, version: &str) {
        if self.states.contains_key(node) {
            self.superseded.insert(node.to_string(), version.to_string());
        }
    }

    /// Drop a settled node; pending nodes are kept
    pub fn forget(&mut self, node: &str) -> bool {
        if self.states.get(node).is_some_and(|state| !state.is_pending()) {
            self.states.remove(node);
            self.superseded.remove(node);
            return true;
        }
        false
    }

    pub fn state(&self, node: &str) -> Option<NodeRoleState> {
        self.states.get(node).copied()
    }

    pub fn states(&self) -> &BTreeMap<String, NodeRoleState> {
        &self.states
    }

    /// Names of nodes committed to the storage role, in name order
    pub fn selected_nodes(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, state)| state.is_selected())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Enter the pending state. Returns the pre-request membership.
    pub fn begin(&mut self, node: &str, target: bool) -> Result<bool> {
        let state = self.states.get_mut(node).ok_or_else(|| Error::NodeNotFound {
            node: node.to_string(),
        })?;
        if state.is_pending() {
            return Err(Error::MutationInFlight {
                node: node.to_string(),
            });
        }
        let previous = state.is_selected();
        *state = NodeRoleState::Pending { previous, target };
        Ok(previous)
    }

    /// The patch succeeded: settle on the requested membership
    pub fn resolve(&mut self, node: &str) -> Option<NodeRoleState> {
        self.settle(node, |_, target| target)
    }

    /// The patch failed: restore the pre-request membership
    pub fn revert(&mut self, node: &str) -> Option<NodeRoleState> {
        self.settle(node, |previous, _| previous)
    }

    fn settle(&mut self, node: &str, pick: impl Fn(bool, bool) -> bool) -> Option<NodeRoleState> {
        let state = self.states.get_mut(node)?;
        if let NodeRoleState::Pending { previous, target } = *state {
            *state = NodeRoleState::from_flag(pick(previous, target));
        }
        Some(*state)
    }
}
