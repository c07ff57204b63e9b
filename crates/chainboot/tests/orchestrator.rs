use std::sync::Arc;
use std::time::Duration;

use chainboot::{ChainConfig, Error, Orchestrator, OrchestratorOptions, TimingConfig};
use chainboot_bridge::{CommandTemplate, CommandTool, MarkerLayout, MigrationOutcome};
use chainboot_probe::{HeightReport, Probe};
use chainboot_probe_mock::ScriptedProber;
use chainboot_supervisor_mock::{RecordingSupervisor, SupervisorEvent};
use chainboot_topology::{BridgeSpec, ChainTopology, NodeDescriptor, NodeState};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use url::Url;

struct Harness {
    cancel: CancellationToken,
    dir: tempfile::TempDir,
    orchestrator: Arc<Orchestrator>,
    prober: Arc<ScriptedProber>,
    supervisor: RecordingSupervisor,
}

fn node(dir: &std::path::Path, name: &str, upstream: Option<&str>) -> NodeDescriptor {
    let node = NodeDescriptor::new(
        name,
        Url::parse(&format!("http://{name}:8545")).unwrap(),
        dir.join(name),
    )
    .with_min_serve_height(50);
    match upstream {
        Some(upstream) => node.with_upstream(upstream),
        None => node,
    }
}

impl Harness {
    /// root -> a, with a shell-backed command tool.
    fn new(bridges: Vec<BridgeSpec>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let topology = ChainTopology::new(
            vec![
                node(dir.path(), "a", Some("root")),
                node(dir.path(), "root", None),
            ],
            bridges,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let prober = Arc::new(ScriptedProber::new());
        let supervisor = RecordingSupervisor::new();

        let tool = CommandTool::new(
            CommandTemplate::new(
                "/bin/sh",
                ["-c", "mkdir -p {datadir} && echo {first}-{last} > {artifact}"],
            ),
            CommandTemplate::new(
                "/bin/sh",
                ["-c", "mkdir -p {datadir} && cat {artifact} >> {datadir}/imported"],
            ),
        );

        let orchestrator = Orchestrator::new(OrchestratorOptions {
            cancel: cancel.clone(),
            layout: MarkerLayout::new(dir.path().join("artifacts")),
            prober: prober.clone(),
            supervisor: Arc::new(supervisor.clone()),
            timing: TimingConfig {
                poll_interval_secs: 1,
                stability_delay_ms: 10,
                ..TimingConfig::default()
            },
            tool: Arc::new(tool),
            topology: Arc::new(topology),
        });

        Self {
            cancel,
            dir,
            orchestrator: Arc::new(orchestrator),
            prober,
            supervisor,
        }
    }
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_run_brings_chain_up_and_stops_on_cancel() {
    let h = Harness::new(vec![]);
    h.prober.push_heights("root", [100]);
    h.prober.push_heights("a", [80]);

    let orchestrator = h.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.run().await });

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.orchestrator.states().get("root"), NodeState::Running);
    assert_eq!(h.orchestrator.states().get("a"), NodeState::Running);

    // Synced nodes are never flagged by their watchdogs.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(
        h.supervisor.events(),
        [
            SupervisorEvent::Start("root".to_string()),
            SupervisorEvent::Start("a".to_string())
        ]
    );

    h.cancel.cancel();
    handle.await.unwrap().unwrap();
    assert!(logs_contain("bring-up complete"));
    assert!(logs_contain("shutdown complete"));
}

#[tokio::test(start_paused = true)]
async fn test_run_returns_cleanly_when_cancelled_during_bring_up() {
    let h = Harness::new(vec![]);

    let orchestrator = h.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.run().await });

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(
        h.orchestrator.states().get("root"),
        NodeState::WaitingForUpstream
    );

    h.cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_status_reports_probes_and_bridges() {
    let h = Harness::new(vec![BridgeSpec::new("root", "a", 40)]);
    h.prober
        .set("root", Probe::Report(HeightReport::synced(100, 3)));

    let report = h.orchestrator.status().await;
    let text = report.to_string();

    assert_eq!(report.nodes[0].name, "root");
    assert_eq!(report.nodes[1].probe, Probe::Unavailable);
    assert!(text.contains("root (min serve height 50): height 100 peers 3"));
    assert!(text.contains("a <- root (min serve height 50): unavailable"));
    assert!(text.contains("root -> a [0, 40]: pending"));
    assert!(h.supervisor.events().is_empty());
}

#[tokio::test]
async fn test_manual_migration_is_idempotent() {
    let h = Harness::new(vec![]);

    let first = h.orchestrator.migrate("root", "a", 40).await.unwrap();
    let second = h.orchestrator.migrate("root", "a", 40).await.unwrap();

    assert_eq!(first, MigrationOutcome::Completed);
    assert_eq!(second, MigrationOutcome::AlreadyDone);

    let imported = std::fs::read_to_string(h.dir.path().join("a").join("imported")).unwrap();
    assert_eq!(imported, "0-40\n");
    assert!(
        h.dir
            .path()
            .join("artifacts")
            .join("a-40.done")
            .exists()
    );

    let report = h.orchestrator.status().await;
    assert!(report.bridges.is_empty());
}

#[tokio::test]
async fn test_manual_migration_rejects_unknown_node() {
    let h = Harness::new(vec![]);

    let result = h.orchestrator.migrate("root", "nope", 40).await;

    assert!(matches!(
        result,
        Err(Error::Bridge(chainboot_bridge::Error::UnknownNode(name))) if name == "nope"
    ));
}

#[test]
fn test_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = ChainConfig::from_file(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(Error::Io(..))));

    let path = dir.path().join("chain.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        ChainConfig::from_file(&path),
        Err(Error::ConfigParse { .. })
    ));
}

#[tokio::test]
async fn test_from_config_builds_real_components() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.json");
    std::fs::write(
        &path,
        format!(
            r#"{{
                "artifacts_dir": "{artifacts}",
                "supervisor": {{ "kind": "container", "runtime": "true" }},
                "tool": {{ "kind": "rpc", "import": {{ "program": "true" }} }},
                "nodes": [
                    {{ "name": "root", "rpc_endpoint": "http://127.0.0.1:1", "data_dir": "/data/root" }}
                ]
            }}"#,
            artifacts = dir.path().join("artifacts").display()
        ),
    )
    .unwrap();

    let config = ChainConfig::from_file(&path).unwrap();
    let orchestrator = Orchestrator::from_config(&config, CancellationToken::new()).unwrap();
    let report = orchestrator.status().await;

    assert_eq!(report.nodes.len(), 1);
    assert_eq!(report.nodes[0].probe, Probe::Unavailable);
}

#[tokio::test]
async fn test_from_config_checks_local_paths() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = dir.path().join("state").join("artifacts");
    let data = dir.path().join("root");
    let config = |data_dir: &std::path::Path| -> ChainConfig {
        serde_json::from_str(&format!(
            r#"{{
                "artifacts_dir": "{artifacts}",
                "supervisor": {{ "kind": "container", "runtime": "true" }},
                "tool": {{
                    "kind": "command",
                    "export": {{ "program": "true" }},
                    "import": {{ "program": "true" }}
                }},
                "nodes": [
                    {{ "name": "root", "rpc_endpoint": "http://127.0.0.1:1", "data_dir": "{data}" }}
                ]
            }}"#,
            artifacts = artifacts.display(),
            data = data_dir.display()
        ))
        .unwrap()
    };

    let result = Orchestrator::from_config(&config(&data), CancellationToken::new());
    assert!(matches!(
        result,
        Err(Error::MissingDataDir { ref node, ref path }) if node == "root" && *path == data
    ));
    assert!(artifacts.is_dir());

    std::fs::create_dir(&data).unwrap();
    assert!(Orchestrator::from_config(&config(&data), CancellationToken::new()).is_ok());

    // The artifacts directory cannot be created under a regular file.
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, "").unwrap();
    let mut unusable = config(&data);
    unusable.artifacts_dir = blocked.join("artifacts");
    assert!(matches!(
        Orchestrator::from_config(&unusable, CancellationToken::new()),
        Err(Error::Io(..))
    ));
}
