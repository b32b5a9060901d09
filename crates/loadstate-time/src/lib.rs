//! loadstate Time - timeline and timers
//!
//! This crate implements the time side of a loading tree:
//! - Timeline clock: monotonic, moved only by its owner
//! - Wall clock: maps OS instants onto the timeline
//! - Timer queue: deadline-ordered, cancellable, deterministic tie-breaking

pub mod clock;
pub mod timer;

pub use clock::*;
pub use timer::*;
