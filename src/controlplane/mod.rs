//! Control Plane Module
//!
//! Wires the reconciliation engine to the cluster: watchers push snapshots
//! into the [`StorageConsole`], which owns selection and alert state and
//! writes through the Kubernetes mutation gateway.

pub mod api;
pub mod config;
pub mod console;
pub mod gateway;
pub mod metrics;
pub mod state;
pub mod watch;

pub use api::*;
pub use config::*;
pub use console::*;
pub use gateway::*;
pub use metrics::*;
pub use state::*;
pub use watch::*;
