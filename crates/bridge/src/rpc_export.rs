//! Export by pulling raw block RLP from a live source over JSON-RPC.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chainboot_probe::JsonRpcClient;
use chainboot_topology::NodeDescriptor;
use chainboot_util::ProgressThrottle;
use serde_json::json;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::ChainDataTool;
use crate::command::CommandTemplate;
use crate::error::{Error, Result};

/// Options for configuring an `RpcExportTool`.
#[derive(Debug, Clone)]
pub struct RpcExportToolOptions {
    /// Blocks requested per batch.
    pub batch_size: u64,

    /// Import command, as for [`crate::CommandTool`].
    pub import: CommandTemplate,

    /// Interval between export progress logs.
    pub progress_interval: Duration,

    /// Per-request timeout. Batches of large blocks can be slow.
    pub request_timeout: Duration,
}

/// Exports with batched `debug_getRawBlock` calls against the running source
/// and concatenates the raw blocks into an importable artifact.
///
/// The source stays online; only the destination is stopped.
#[derive(Debug, Clone)]
pub struct RpcExportTool {
    batch_size: u64,
    import: CommandTemplate,
    progress_interval: Duration,
    request_timeout: Duration,
}

impl RpcExportTool {
    /// Creates a new `RpcExportTool`.
    #[must_use]
    pub fn new(
        RpcExportToolOptions {
            batch_size,
            import,
            progress_interval,
            request_timeout,
        }: RpcExportToolOptions,
    ) -> Self {
        Self {
            batch_size: batch_size.max(1),
            import,
            progress_interval,
            request_timeout,
        }
    }
}

fn decode_raw_block(height: u64, value: &serde_json::Value) -> Result<Vec<u8>> {
    let raw = value.as_str().ok_or_else(|| Error::RawBlock {
        height,
        reason: format!("expected hex string, got {value}"),
    })?;
    let hex_body = raw.strip_prefix("0x").ok_or_else(|| Error::RawBlock {
        height,
        reason: "missing 0x prefix".to_string(),
    })?;
    let bytes = hex::decode(hex_body).map_err(|e| Error::RawBlock {
        height,
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(Error::RawBlock {
            height,
            reason: "empty block".to_string(),
        });
    }
    Ok(bytes)
}

#[async_trait]
impl ChainDataTool for RpcExportTool {
    fn requires_offline_source(&self) -> bool {
        false
    }

    async fn export(
        &self,
        source: &NodeDescriptor,
        artifact: &Path,
        first: u64,
        last: u64,
    ) -> Result<()> {
        let client = JsonRpcClient::new(source.rpc_endpoint.clone(), self.request_timeout)?;

        // Always from scratch: no partial resume.
        let mut file = File::create(artifact)
            .await
            .map_err(|e| Error::Io("failed to create artifact", e))?;

        let mut throttle = ProgressThrottle::new(self.progress_interval);
        let mut next = first;

        while next <= last {
            let end = last.min(next.saturating_add(self.batch_size - 1));
            let heights: Vec<u64> = (next..=end).collect();
            let params: Vec<_> = heights
                .iter()
                .map(|height| json!([format!("{height:#x}")]))
                .collect();
            let calls: Vec<(&str, serde_json::Value)> = params
                .into_iter()
                .map(|params| ("debug_getRawBlock", params))
                .collect();

            let results = client.batch_call(&calls).await?;

            for (height, result) in heights.into_iter().zip(results) {
                let bytes = decode_raw_block(height, &result?)?;
                file.write_all(&bytes)
                    .await
                    .map_err(|e| Error::Io("failed to write artifact", e))?;
            }

            if throttle.due() {
                info!(node = %source.name, height = end, last, "rpc export progress");
            }

            if end == u64::MAX {
                break;
            }
            next = end + 1;
        }

        file.flush()
            .await
            .map_err(|e| Error::Io("failed to flush artifact", e))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Io("failed to sync artifact", e))?;

        info!(node = %source.name, first, last, artifact = %artifact.display(), "rpc export complete");
        Ok(())
    }

    async fn import(&self, dest: &NodeDescriptor, artifact: &Path) -> Result<()> {
        let datadir = dest.data_dir.display().to_string();
        let artifact_str = artifact.display().to_string();

        info!(node = %dest.name, artifact = %artifact_str, "importing artifact");

        self.import
            .run(
                "import",
                dest,
                &[("datadir", &datadir), ("artifact", &artifact_str)],
            )
            .await
    }
}
