//! `MigrateRange` and its repair sub-case.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chainboot_supervisor::{NodeLocks, NodeSupervisor};
use chainboot_topology::{BridgeSpec, ChainTopology, NodeDescriptor};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ChainDataTool;
use crate::error::{Error, Result};
use crate::layout::MarkerLayout;
use crate::marker;
use crate::task::BridgeTask;

type MigrationFuture<'a> = Pin<Box<dyn Future<Output = Result<MigrationOutcome>> + Send + 'a>>;

/// What a call to [`Migrator::migrate_range`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The done marker already existed; nothing was touched.
    AlreadyDone,
    /// The range was exported, imported and marked done.
    Completed,
}

/// Options for configuring a `Migrator`.
pub struct MigratorOptions {
    /// Aborts in-flight export/import steps.
    pub cancel: CancellationToken,

    /// Artifact and marker paths.
    pub layout: MarkerLayout,

    /// Shared per-node locks.
    pub locks: NodeLocks,

    /// Blocks in the source's test export.
    pub repair_probe_blocks: u64,

    /// Grace period for stopping nodes.
    pub stop_timeout: Duration,

    /// Process control.
    pub supervisor: Arc<dyn NodeSupervisor>,

    /// Store reader/writer.
    pub tool: Arc<dyn ChainDataTool>,

    /// Validated chain.
    pub topology: Arc<ChainTopology>,
}

/// Runs bridge migrations.
pub struct Migrator {
    cancel: CancellationToken,
    layout: MarkerLayout,
    locks: NodeLocks,
    repair_probe_blocks: u64,
    stop_timeout: Duration,
    supervisor: Arc<dyn NodeSupervisor>,
    tool: Arc<dyn ChainDataTool>,
    topology: Arc<ChainTopology>,
}

impl Migrator {
    /// Creates a new `Migrator`.
    #[must_use]
    pub fn new(
        MigratorOptions {
            cancel,
            layout,
            locks,
            repair_probe_blocks,
            stop_timeout,
            supervisor,
            tool,
            topology,
        }: MigratorOptions,
    ) -> Self {
        Self {
            cancel,
            layout,
            locks,
            repair_probe_blocks: repair_probe_blocks.max(1),
            stop_timeout,
            supervisor,
            tool,
            topology,
        }
    }

    /// Artifact and marker paths.
    #[must_use]
    pub const fn layout(&self) -> &MarkerLayout {
        &self.layout
    }

    /// Runs `task` and refreshes its state from disk afterwards.
    ///
    /// # Errors
    ///
    /// See [`Migrator::migrate_range`].
    pub async fn run(&self, task: &mut BridgeTask) -> Result<MigrationOutcome> {
        let result = self
            .migrate_range(&task.source, &task.dest, task.cutoff_height)
            .await;
        task.refresh(&self.layout);
        result
    }

    /// Moves blocks `[0, cutoff]` from `source` into `dest`.
    ///
    /// Returns immediately if the done marker for (`dest`, `cutoff`) exists.
    /// Otherwise test-exports a few blocks from `source`, repairing it from
    /// its own upstream first if that fails, then exports and imports the
    /// whole range with both stores offline and writes the done marker.
    ///
    /// # Errors
    ///
    /// Any failure leaves the done marker absent; the caller retries from the
    /// top. A crash or failure mid-step leaves that step's marker behind.
    pub fn migrate_range<'a>(
        &'a self,
        source: &'a str,
        dest: &'a str,
        cutoff: u64,
    ) -> MigrationFuture<'a> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let done = self.layout.done_marker(dest, cutoff);
            if marker::exists(&done).await {
                debug!(source, dest, cutoff, "migration already done");
                return Ok(MigrationOutcome::AlreadyDone);
            }

            let source_node = self.node(source)?;
            let dest_node = self.node(dest)?;

            info!(source, dest, cutoff, "migration started");

            self.ensure_source_complete(source_node, dest, cutoff).await?;
            self.transfer(source_node, dest_node, cutoff).await?;

            Ok(MigrationOutcome::Completed)
        })
    }

    fn node(&self, name: &str) -> Result<&NodeDescriptor> {
        self.topology
            .node(name)
            .ok_or_else(|| Error::UnknownNode(name.to_string()))
    }

    async fn cancellable(&self, step: impl Future<Output = Result<()>>) -> Result<()> {
        tokio::select! {
            result = step => result,
            () = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    async fn ensure_source_complete(
        &self,
        source: &NodeDescriptor,
        dest: &str,
        cutoff: u64,
    ) -> Result<()> {
        if self.test_export(source, cutoff).await? {
            return Ok(());
        }

        let upstream = self
            .topology
            .upstream_of(&source.name)
            .ok_or_else(|| Error::NoRepairSource(source.name.clone()))?;

        let repair_cutoff = self
            .topology
            .bridges()
            .iter()
            .find(|b| b.source == source.name && b.dest == dest && b.cutoff_height == cutoff)
            .map_or(cutoff, BridgeSpec::effective_repair_cutoff);

        warn!(
            node = %source.name,
            upstream = %upstream.name,
            cutoff = repair_cutoff,
            "source cannot serve its early range, repairing from upstream"
        );

        self.migrate_range(&upstream.name, &source.name, repair_cutoff)
            .await?;

        if self.test_export(source, cutoff).await? {
            info!(node = %source.name, cutoff = repair_cutoff, "source repaired");
            Ok(())
        } else {
            Err(Error::RepairIneffective {
                source_node: source.name.clone(),
                cutoff: repair_cutoff,
            })
        }
    }

    /// Exports the first few blocks to a scratch file. `Ok(false)` means the
    /// source is missing part of its early range.
    async fn test_export(&self, source: &NodeDescriptor, cutoff: u64) -> Result<bool> {
        let probe = self.layout.probe_artifact(&source.name);
        let last = cutoff.min(self.repair_probe_blocks - 1);

        fs::create_dir_all(self.layout.exports_dir())
            .await
            .map_err(|e| Error::Io("failed to create exports directory", e))?;

        let _guard = self.locks.acquire(&source.name).await;
        let stop_source = self.tool.requires_offline_source();
        if stop_source {
            self.supervisor.stop(source, self.stop_timeout).await?;
        }

        let result = self
            .cancellable(self.tool.export(source, &probe, 0, last))
            .await;

        // The source is an upstream; it goes back up whatever the outcome.
        if stop_source {
            if let Err(e) = self.supervisor.start(source).await {
                warn!(node = %source.name, error = %e, "failed to restart source after test export");
            }
        }

        let written = marker::len(&probe).await;
        marker::remove(&probe).await?;

        match result {
            Ok(()) if written > 0 => {
                debug!(node = %source.name, last, "test export succeeded");
                Ok(true)
            }
            Ok(()) => {
                warn!(node = %source.name, last, "test export produced no data");
                Ok(false)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(node = %source.name, last, error = %e, "test export failed");
                Ok(false)
            }
        }
    }

    async fn transfer(
        &self,
        source: &NodeDescriptor,
        dest: &NodeDescriptor,
        cutoff: u64,
    ) -> Result<()> {
        let (_source_guard, _dest_guard) = self.locks.acquire_pair(&source.name, &dest.name).await;

        let stop_source = self.tool.requires_offline_source();
        if stop_source {
            info!(node = %source.name, "stopping source for export");
            self.supervisor.stop(source, self.stop_timeout).await?;
        }
        info!(node = %dest.name, "stopping destination for import");
        self.supervisor.stop(dest, self.stop_timeout).await?;

        if let Err(e) = self.export_then_import(source, dest, cutoff).await {
            warn!(source = %source.name, dest = %dest.name, cutoff, error = %e, "migration failed, done marker not written");
            if stop_source {
                if let Err(start_err) = self.supervisor.start(source).await {
                    warn!(node = %source.name, error = %start_err, "failed to restart source after failed migration");
                }
            }
            return Err(e);
        }

        marker::create_atomic(&self.layout.done_marker(&dest.name, cutoff)).await?;
        info!(source = %source.name, dest = %dest.name, cutoff, state = "done", "migration done");

        if stop_source {
            self.supervisor.start(source).await?;
        }
        self.supervisor.start(dest).await?;

        Ok(())
    }

    async fn export_then_import(
        &self,
        source: &NodeDescriptor,
        dest: &NodeDescriptor,
        cutoff: u64,
    ) -> Result<()> {
        let artifact = self.layout.artifact(&source.name, cutoff);
        let exporting = self.layout.exporting_marker(&source.name, cutoff);
        let importing = self.layout.importing_marker(&dest.name, cutoff);

        if marker::remove(&exporting).await? {
            warn!(node = %source.name, cutoff, "stale export marker found, exporting from scratch");
        }
        marker::remove(&artifact).await?;

        marker::create(&exporting).await?;
        info!(node = %source.name, cutoff, state = "exporting", "export started");

        self.cancellable(self.tool.export(source, &artifact, 0, cutoff))
            .await?;

        let bytes = marker::len(&artifact).await;
        if bytes == 0 {
            return Err(Error::EmptyArtifact(artifact));
        }
        marker::remove(&exporting).await?;
        info!(node = %source.name, cutoff, bytes, "export finished");

        if marker::remove(&importing).await? {
            warn!(node = %dest.name, cutoff, "stale import marker found, importing again");
        }
        marker::create(&importing).await?;
        info!(node = %dest.name, cutoff, state = "importing", "import started");

        self.cancellable(self.tool.import(dest, &artifact)).await?;

        marker::remove(&importing).await?;
        info!(node = %dest.name, cutoff, "import finished");

        Ok(())
    }
}
