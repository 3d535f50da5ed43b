//! API Module
//!
//! REST API over the storage console: LUN and node selection, requirements,
//! alerts, and filesystem and cluster creation.

pub mod server;
pub mod rest;

pub use server::*;
pub use rest::*;
