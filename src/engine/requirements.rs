//! Minimum-Requirements Validator
//!
//! Gates storage cluster creation on the number of selected storage nodes
//! and the number of shared disks they can all see.

use serde::{Deserialize, Serialize};

/// Thresholds for creating a storage cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MinimumRequirements {
    pub min_nodes: usize,
    pub min_shared_disks: usize,
}

impl Default for MinimumRequirements {
    fn default() -> Self {
        Self {
            min_nodes: 3,
            min_shared_disks: 1,
        }
    }
}

/// A single failed threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RequirementViolation {
    TooFewNodes { required: usize, selected: usize },
    TooFewSharedDisks { required: usize, found: usize },
}

impl std::fmt::Display for RequirementViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequirementViolation::TooFewNodes { required, selected } => write!(
                f,
                "At least {} storage nodes must be selected ({} selected)",
                required, selected
            ),
            RequirementViolation::TooFewSharedDisks { required, found } => write!(
                f,
                "At least {} shared disk(s) visible from every selected node are required ({} found)",
                required, found
            ),
        }
    }
}

/// Outcome of a requirements check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementCheck {
    pub violations: Vec<RequirementViolation>,
}

impl RequirementCheck {
    pub fn passes(&self) -> bool {
        self.violations.is_empty()
    }

    /// One line per violated threshold; empty when everything passes
    pub fn message(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl MinimumRequirements {
    /// Evaluate both thresholds independently
    pub fn check(&self, selected_nodes: usize, shared_disks: usize) -> RequirementCheck {
        let mut violations = Vec::new();
        if selected_nodes < self.min_nodes {
            violations.push(RequirementViolation::TooFewNodes {
                required: self.min_nodes,
                selected: selected_nodes,
            });
        }
        if shared_disks < self.min_shared_disks {
            violations.push(RequirementViolation::TooFewSharedDisks {
                required: self.min_shared_disks,
                found: shared_disks,
            });
        }
        RequirementCheck { violations }
    }
}
