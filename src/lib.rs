//! Fusion Access Reconciler - Shared LUN Discovery and Selection
//!
//! Reconciles per-node device discovery results into the set of LUNs that
//! every selected storage node can see, tracks the user's LUN and node
//! selection, and gates storage cluster creation on minimum requirements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              REST API (axum)                                 │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                             Storage Console                                  │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │  LUN / Node     │  │  Requirements   │  │   Alerts + CTA              │  │
//! │  │  Selection      │  │  Validator      │  │   (reducer)                 │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────────────────────┘  │
//! │           └────────────────────┤                                             │
//! │                    ┌───────────┴───────────┐                                │
//! │                    │  Shared LUN Engine    │                                │
//! │                    │  catalog ∩ nodes − LD │                                │
//! │                    └───────────▲───────────┘                                │
//! ├────────────────────────────────┼────────────────────────────────────────────┤
//! │        Watchers (nodes, LocalVolumeDiscoveryResults, LocalDisks)             │
//! │        Mutation Gateway (node label patch, FileSystemClaim, Cluster)         │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Console, watchers, gateway, metrics and REST API
//! - [`engine`]: Pure shared-LUN reconciliation and selection state
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod controlplane;
pub mod crd;
pub mod domain;
pub mod engine;
pub mod error;

// Re-export commonly used types
pub use controlplane::{
    spawn_watchers, ApiServer, ApiServerConfig, ConsoleConfig, ConsoleMetrics, KubeGateway,
    LabelPair, StorageConsole, ToggleOutcome,
};

pub use crd::{
    Cluster, DiscoveredDevice, FileSystemClaim, LocalDisk, LocalVolumeDiscoveryResult,
};

pub use domain::ports::{JsonPatchOp, MutationGateway, StorageNode, WatchSnapshot};

pub use engine::{
    build_catalog, compute_shared_luns, exclude_claimed, intersect_shared, FlatEntry, Lun,
    MinimumRequirements, NodeDiscoveryResult, NodeRoleState, RequirementCheck,
};

pub use error::{Error, ErrorAction, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
