//! Domain layer - Core port definitions
//!
//! Defines the contracts between the reconciliation engine and the cluster,
//! following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
