//! Bridge Migrator: one-shot offline transfer of blocks `[0, cutoff]` between
//! two adjacent nodes that cannot live-peer.
//!
//! The only durable state is on disk. An artifact per (source, cutoff), an
//! `.exporting` marker next to it while an export runs, an `.importing`
//! marker while the destination ingests it, and a `.done` marker once the
//! whole migration has succeeded. A marker left behind by a crash always
//! reads as "not complete".
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod command;
mod error;
mod layout;
mod marker;
mod migrator;
mod rpc_export;
mod task;

pub use command::{CommandTemplate, CommandTool};
pub use error::{Error, Result};
pub use layout::MarkerLayout;
pub use migrator::{MigrationOutcome, Migrator, MigratorOptions};
pub use rpc_export::{RpcExportTool, RpcExportToolOptions};
pub use task::{BridgeState, BridgeTask};

use std::path::Path;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;

/// Reads and writes a node's local chain store.
#[async_trait]
pub trait ChainDataTool: Send + Sync + 'static {
    /// Whether `export` needs exclusive access to the source's store.
    fn requires_offline_source(&self) -> bool {
        true
    }

    /// Writes the canonical blocks `[first, last]` of `source` to `artifact`,
    /// replacing anything already there.
    async fn export(
        &self,
        source: &NodeDescriptor,
        artifact: &Path,
        first: u64,
        last: u64,
    ) -> Result<()>;

    /// Ingests `artifact` into `dest`'s store.
    async fn import(&self, dest: &NodeDescriptor, artifact: &Path) -> Result<()>;
}
