//! Shared Device Reconciliation Engine
//!
//! Pure, synchronous reconciliation of per-node discovery results into the
//! set of LUNs every selected storage node can see, plus the selection state
//! and minimum-requirements checks layered on top.
//!
//! ```text
//! discovery results ──► catalog ──► intersection ──► exclusion ──► Lun list
//!                                        ▲                ▲            │
//!                         selected storage nodes    LocalDisks         ▼
//!                                                          selection / requirements
//! ```

pub mod catalog;
pub mod exclusion;
pub mod intersection;
pub mod lun;
pub mod recompute;
pub mod requirements;
pub mod selection;

pub use catalog::*;
pub use exclusion::*;
pub use intersection::*;
pub use lun::*;
pub use recompute::*;
pub use requirements::*;
pub use selection::*;
