//! Stage Sequencer and Ahead-of-Upstream Guard.
//!
//! Nodes are brought up strictly one at a time along the chain. A node is
//! only marked running once it and its upstream both stably serve the node's
//! minimum serve height, and once it is known not to be ahead of its
//! upstream.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod guard;
mod poller;
mod sequencer;

pub use error::{Error, Result};
pub use guard::{AheadGuard, GuardOutcome};
pub use poller::{Poller, PollerOptions, Readiness};
pub use sequencer::{Sequencer, SequencerOptions};
