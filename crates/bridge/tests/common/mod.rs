#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainboot_bridge::{ChainDataTool, Error, MarkerLayout, Migrator, MigratorOptions, Result};
use chainboot_supervisor::NodeLocks;
use chainboot_supervisor_mock::RecordingSupervisor;
use chainboot_topology::{BridgeSpec, ChainTopology, NodeDescriptor};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Writes `<source>:<first>-<last>` as the artifact and records every call.
///
/// Nodes in `missing_early` fail every export until something is imported
/// into them, unless they are also `unrepairable`.
#[derive(Default)]
pub struct FakeTool {
    pub exports: Mutex<Vec<(String, u64, u64)>>,
    pub imports: Mutex<Vec<(String, String)>>,
    pub missing_early: Mutex<HashSet<String>>,
    pub unrepairable: Mutex<HashSet<String>>,
    pub fail_imports: Mutex<bool>,
    pub online: bool,
}

impl FakeTool {
    pub fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }

    pub fn import_count(&self) -> usize {
        self.imports.lock().unwrap().len()
    }

    /// Exports of the full range, ignoring test exports.
    pub fn full_exports(&self) -> Vec<(String, u64, u64)> {
        self.exports
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, last)| *last > 15)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChainDataTool for FakeTool {
    fn requires_offline_source(&self) -> bool {
        !self.online
    }

    async fn export(
        &self,
        source: &NodeDescriptor,
        artifact: &Path,
        first: u64,
        last: u64,
    ) -> Result<()> {
        self.exports
            .lock()
            .unwrap()
            .push((source.name.clone(), first, last));

        if self.missing_early.lock().unwrap().contains(&source.name) {
            return Err(Error::RawBlock {
                height: first,
                reason: "header not found".to_string(),
            });
        }

        std::fs::write(artifact, format!("{}:{first}-{last}\n", source.name))
            .map_err(|e| Error::Io("write artifact", e))
    }

    async fn import(&self, dest: &NodeDescriptor, artifact: &Path) -> Result<()> {
        let content = std::fs::read_to_string(artifact).map_err(|e| Error::Io("read artifact", e))?;
        self.imports
            .lock()
            .unwrap()
            .push((dest.name.clone(), content.trim().to_string()));

        if *self.fail_imports.lock().unwrap() {
            return Err(Error::RawBlock {
                height: 0,
                reason: "import failed".to_string(),
            });
        }

        if !self.unrepairable.lock().unwrap().contains(&dest.name) {
            self.missing_early.lock().unwrap().remove(&dest.name);
        }
        Ok(())
    }
}

pub fn node(name: &str, upstream: Option<&str>) -> NodeDescriptor {
    let node = NodeDescriptor::new(
        name,
        Url::parse(&format!("http://{name}:8545")).unwrap(),
        format!("/data/{name}"),
    );
    match upstream {
        Some(upstream) => node.with_upstream(upstream),
        None => node,
    }
}

/// root -> a -> b
pub fn topology(bridges: Vec<BridgeSpec>) -> Arc<ChainTopology> {
    Arc::new(
        ChainTopology::new(
            vec![node("root", None), node("a", Some("root")), node("b", Some("a"))],
            bridges,
        )
        .unwrap(),
    )
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub layout: MarkerLayout,
    pub migrator: Migrator,
    pub supervisor: RecordingSupervisor,
    pub tool: Arc<FakeTool>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(tool: FakeTool, bridges: Vec<BridgeSpec>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = MarkerLayout::new(dir.path().join("artifacts"));
        let supervisor = RecordingSupervisor::new().with_running(&["root", "a", "b"]);
        let tool = Arc::new(tool);
        let cancel = CancellationToken::new();

        let migrator = Migrator::new(MigratorOptions {
            cancel: cancel.clone(),
            layout: layout.clone(),
            locks: NodeLocks::new(),
            repair_probe_blocks: 16,
            stop_timeout: Duration::from_secs(30),
            supervisor: Arc::new(supervisor.clone()),
            tool: Arc::clone(&tool) as Arc<dyn ChainDataTool>,
            topology: topology(bridges),
        });

        Self {
            dir,
            layout,
            migrator,
            supervisor,
            tool,
            cancel,
        }
    }
}
