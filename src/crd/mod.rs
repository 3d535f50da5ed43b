//! Custom Resource Definitions consumed and produced by the reconciler
//!
//! - LocalVolumeDiscoveryResult: per-node device discovery (read)
//! - LocalDisk: devices already bound by the storage layer (read)
//! - FileSystemClaim: filesystem request over selected LUNs (create)
//! - Cluster: Storage Scale cluster singleton (create)

pub mod cluster;
pub mod discovery_result;
pub mod filesystem_claim;
pub mod local_disk;

pub use cluster::*;
pub use discovery_result::*;
pub use filesystem_claim::*;
pub use local_disk::*;
