//! Small shared helpers for the chain bootstrap crates.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod pacing;
pub mod port_allocator;
pub mod template;

pub use pacing::{ProgressThrottle, sleep_or_cancel};
