//! [`HealthProber`] over HTTP JSON-RPC.

use std::time::Duration;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Result;
use crate::json_rpc::JsonRpcClient;
use crate::quantity::{SyncStatus, parse_quantity, parse_sync_status};
use crate::report::{HeightReport, Probe};
use crate::HealthProber;

/// Options for configuring a `JsonRpcProber`.
#[derive(Debug, Clone, Copy)]
pub struct JsonRpcProberOptions {
    /// Per-request timeout. Probes are expected to be short.
    pub timeout: Duration,
}

impl Default for JsonRpcProberOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
        }
    }
}

/// Probes nodes over their JSON-RPC HTTP endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcProber {
    client: Client,
}

impl JsonRpcProber {
    /// Creates a new `JsonRpcProber`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(JsonRpcProberOptions { timeout }: JsonRpcProberOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    fn rpc(&self, node: &NodeDescriptor) -> JsonRpcClient {
        JsonRpcClient::with_client(self.client.clone(), node.rpc_endpoint.clone())
    }
}

#[async_trait]
impl HealthProber for JsonRpcProber {
    async fn probe(&self, node: &NodeDescriptor) -> Probe {
        let rpc = self.rpc(node);

        let height = match rpc.call("eth_blockNumber", json!([])).await {
            Ok(value) => match parse_quantity(&value) {
                Some(height) => height,
                None => {
                    debug!(node = %node.name, %value, "unparseable block number");
                    return Probe::Unavailable;
                }
            },
            Err(e) => {
                debug!(node = %node.name, error = %e, "node unavailable");
                return Probe::Unavailable;
            }
        };

        // Very old clients lack eth_syncing; treat that as not syncing.
        let sync = match rpc.call("eth_syncing", json!([])).await {
            Ok(value) => parse_sync_status(&value),
            Err(e) => {
                debug!(node = %node.name, error = %e, "eth_syncing unavailable");
                SyncStatus::NotSyncing
            }
        };

        let peer_count = rpc
            .call("net_peerCount", json!([]))
            .await
            .ok()
            .as_ref()
            .and_then(parse_quantity)
            .unwrap_or(0);

        let report = match sync {
            SyncStatus::NotSyncing => HeightReport::synced(height, peer_count),
            SyncStatus::Syncing { current, highest } => HeightReport {
                height,
                is_syncing: true,
                sync_current: current,
                sync_target: highest,
                peer_count,
            },
        };

        Probe::Report(report)
    }

    async fn block_hash(&self, node: &NodeDescriptor, height: u64) -> Option<String> {
        let block = match self
            .rpc(node)
            .call("eth_getBlockByNumber", json!([format!("{height:#x}"), false]))
            .await
        {
            Ok(block) => block,
            Err(e) => {
                debug!(node = %node.name, height, error = %e, "block query failed");
                return None;
            }
        };

        block
            .get("hash")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
