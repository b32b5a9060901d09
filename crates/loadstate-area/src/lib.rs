//! loadstate Area - the loading area tree
//!
//! This crate implements the loading area node and its tree:
//! - Own loading flag plus OR-aggregation over child segments
//! - Debounce before honoring a request to stop loading
//! - Minimum loading time after activation
//! - Forced transitions that bypass timing and cascade to the subtree
//! - Ordered subscriptions notified once per effective state change

pub mod node;
pub mod subscription;
pub mod tree;

pub use node::*;
pub use subscription::*;
pub use tree::*;
