//! Static description of the node chain: descriptors, bridges, watchdog
//! thresholds and the per-node lifecycle state table.
//!
//! The chain is strictly linear. Every node has at most one upstream and at
//! most one downstream, and [`ChainTopology`] rejects anything else at
//! construction time.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bridge;
mod chain;
mod error;
mod node;
mod state;
mod thresholds;

pub use bridge::BridgeSpec;
pub use chain::ChainTopology;
pub use error::{Result, TopologyError};
pub use node::NodeDescriptor;
pub use state::{NodeState, NodeStateTable};
pub use thresholds::WatchdogThresholds;
