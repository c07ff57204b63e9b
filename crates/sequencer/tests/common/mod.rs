#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chainboot_bridge::{ChainDataTool, Error, MarkerLayout, Migrator, MigratorOptions, Result};
use chainboot_probe_mock::ScriptedProber;
use chainboot_sequencer::{AheadGuard, Poller, PollerOptions, Sequencer, SequencerOptions};
use chainboot_supervisor::NodeLocks;
use chainboot_supervisor_mock::RecordingSupervisor;
use chainboot_topology::{BridgeSpec, ChainTopology, NodeDescriptor, NodeStateTable};
use tokio_util::sync::CancellationToken;
use url::Url;

pub const POLL: Duration = Duration::from_secs(5);

/// Writes a small artifact per export; fails the first `failing_imports`
/// imports.
#[derive(Default)]
pub struct FlakyTool {
    pub exports: AtomicU32,
    pub failing_imports: AtomicU32,
    pub imports: AtomicU32,
}

#[async_trait]
impl ChainDataTool for FlakyTool {
    async fn export(
        &self,
        source: &NodeDescriptor,
        artifact: &Path,
        first: u64,
        last: u64,
    ) -> Result<()> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(artifact, format!("{}:{first}-{last}\n", source.name))
            .await
            .map_err(|e| Error::Io("write artifact", e))
    }

    async fn import(&self, _dest: &NodeDescriptor, _artifact: &Path) -> Result<()> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_imports.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_imports.store(failing - 1, Ordering::SeqCst);
            return Err(Error::RawBlock {
                height: 0,
                reason: "import failed".to_string(),
            });
        }
        Ok(())
    }
}

pub fn node(name: &str, upstream: Option<&str>, min_serve_height: u64) -> NodeDescriptor {
    let node = NodeDescriptor::new(
        name,
        Url::parse(&format!("http://{name}:8545")).unwrap(),
        format!("/data/{name}"),
    )
    .with_min_serve_height(min_serve_height);
    match upstream {
        Some(upstream) => node.with_upstream(upstream),
        None => node,
    }
}

pub struct Harness {
    pub cancel: CancellationToken,
    pub dir: tempfile::TempDir,
    pub layout: MarkerLayout,
    pub locks: NodeLocks,
    pub poller: Poller,
    pub prober: Arc<ScriptedProber>,
    pub states: Arc<NodeStateTable>,
    pub supervisor: RecordingSupervisor,
    pub tool: Arc<FlakyTool>,
    pub topology: Arc<ChainTopology>,
}

impl Harness {
    /// root (min 0) -> a (min 100) -> b (min 100)
    pub fn new(bridges: Vec<BridgeSpec>) -> Self {
        let topology = Arc::new(
            ChainTopology::new(
                vec![
                    node("root", None, 0),
                    node("a", Some("root"), 100),
                    node("b", Some("a"), 100),
                ],
                bridges,
            )
            .unwrap(),
        );
        let cancel = CancellationToken::new();
        let prober = Arc::new(ScriptedProber::new());
        let dir = tempfile::tempdir().unwrap();

        let poller = Poller::new(PollerOptions {
            cancel: cancel.clone(),
            poll_interval: POLL,
            progress_interval: Duration::from_secs(60),
            prober: prober.clone(),
            stability_delay: Duration::from_secs(1),
        });

        Self {
            cancel,
            layout: MarkerLayout::new(dir.path().join("artifacts")),
            dir,
            locks: NodeLocks::new(),
            poller,
            prober,
            states: Arc::new(NodeStateTable::new(["root", "a", "b"])),
            supervisor: RecordingSupervisor::new(),
            tool: Arc::new(FlakyTool::default()),
            topology,
        }
    }

    pub fn guard(&self) -> AheadGuard {
        AheadGuard::new(
            self.locks.clone(),
            self.poller.clone(),
            Duration::from_secs(30),
            Arc::new(self.supervisor.clone()),
        )
    }

    pub fn sequencer(&self, max_migration_attempts: Option<u32>) -> Sequencer {
        let migrator = Migrator::new(MigratorOptions {
            cancel: self.cancel.clone(),
            layout: self.layout.clone(),
            locks: self.locks.clone(),
            repair_probe_blocks: 16,
            stop_timeout: Duration::from_secs(30),
            supervisor: Arc::new(self.supervisor.clone()),
            tool: self.tool.clone(),
            topology: self.topology.clone(),
        });

        Sequencer::new(SequencerOptions {
            locks: self.locks.clone(),
            max_migration_attempts,
            migration_retry_interval: Duration::from_secs(30),
            migrator: Arc::new(migrator),
            poller: self.poller.clone(),
            states: self.states.clone(),
            stop_timeout: Duration::from_secs(30),
            supervisor: Arc::new(self.supervisor.clone()),
            topology: self.topology.clone(),
        })
    }
}
