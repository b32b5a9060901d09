//! loadstate Test Harness - scenario scripts and flicker simulation
//!
//! This crate provides:
//! - Scripted scenarios with timed expectations
//! - Seeded random flicker traffic with invariant checks
//! - Benchmarks for the loading tree

pub mod flicker;
pub mod scenario;

pub use flicker::*;
pub use scenario::*;
