//! loadstate Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every loadstate crate:
//! - Identifiers (AreaId)
//! - Time primitives (Timestamp)
//! - Timing policy (LoadingConfig, ConfigPatch, SetLoadingOptions)
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod config;
pub mod error;

pub use id::*;
pub use time::*;
pub use config::*;
pub use error::*;
