//! loadstate Runtime - registry and service
//!
//! This crate wraps the loading tree for applications:
//! 1. Registry of named top-level areas
//! 2. Path addressing of segments ("checkout/payment")
//! 3. Backward-compatible get/set facade by name
//! 4. Service task that owns the registry and fires timers on wall time
//! 5. Configuration files and logging setup

pub mod config;
pub mod logging;
pub mod manager;
pub mod service;

pub use config::*;
pub use logging::*;
pub use manager::*;
pub use service::*;
