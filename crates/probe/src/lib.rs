//! Health Prober: height, sync and peer status of a node's JSON-RPC surface,
//! normalized into a [`HeightReport`].
//!
//! Every failure to talk to a node is absorbed here. Callers only ever see
//! [`Probe::Unavailable`] or `None`, never an error.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod http;
mod json_rpc;
mod quantity;
mod report;
mod stability;

pub use error::{Error, Result};
pub use http::{JsonRpcProber, JsonRpcProberOptions};
pub use json_rpc::JsonRpcClient;
pub use quantity::{SyncStatus, parse_quantity, parse_sync_status};
pub use report::{HeightReport, Probe};
pub use stability::serves_height_stably;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;

/// Queries a node's health.
#[async_trait]
pub trait HealthProber: Send + Sync + 'static {
    /// Current height, sync and peer status, or [`Probe::Unavailable`].
    async fn probe(&self, node: &NodeDescriptor) -> Probe;

    /// Hash of the canonical block at `height`, or `None` if the node is
    /// unreachable or does not serve that block.
    async fn block_hash(&self, node: &NodeDescriptor, height: u64) -> Option<String>;
}
