mod common;

use chainboot_bridge::{BridgeState, BridgeTask, Error, MigrationOutcome};
use chainboot_supervisor_mock::SupervisorEvent;
use chainboot_topology::BridgeSpec;
use common::{FakeTool, Harness};
use tracing_test::traced_test;

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
#[traced_test]
async fn test_migration_exports_imports_and_marks_done() {
    let h = Harness::new(FakeTool::default(), vec![BridgeSpec::new("a", "b", 100)]);

    let outcome = h.migrator.migrate_range("a", "b", 100).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::Completed);
    assert!(h.layout.done_marker("b", 100).exists());
    assert!(!h.layout.exporting_marker("a", 100).exists());
    assert!(!h.layout.importing_marker("b", 100).exists());
    assert_eq!(read(&h.layout.artifact("a", 100)), "a:0-100\n");
    assert_eq!(
        *h.tool.imports.lock().unwrap(),
        [("b".to_string(), "a:0-100".to_string())]
    );

    // Both nodes offline during the transfer, both back up afterwards.
    assert_eq!(
        h.supervisor.events_for("b"),
        [
            SupervisorEvent::Stop("b".to_string()),
            SupervisorEvent::Start("b".to_string())
        ]
    );
    assert!(h.supervisor.is_running("a"));
    assert!(h.supervisor.is_running("b"));
    assert!(logs_contain("export started"));
    assert!(logs_contain("import started"));
    assert!(logs_contain("migration done"));
}

#[tokio::test]
async fn test_second_invocation_is_a_no_op() {
    let h = Harness::new(FakeTool::default(), vec![BridgeSpec::new("a", "b", 100)]);

    h.migrator.migrate_range("a", "b", 100).await.unwrap();
    let artifact = read(&h.layout.artifact("a", 100));
    let done = read(&h.layout.done_marker("b", 100));
    let exports = h.tool.export_count();
    let events = h.supervisor.events().len();

    let outcome = h.migrator.migrate_range("a", "b", 100).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::AlreadyDone);
    assert_eq!(h.tool.export_count(), exports);
    assert_eq!(h.tool.import_count(), 1);
    assert_eq!(h.supervisor.events().len(), events);
    assert_eq!(read(&h.layout.artifact("a", 100)), artifact);
    assert_eq!(read(&h.layout.done_marker("b", 100)), done);
}

#[tokio::test]
#[traced_test]
async fn test_stale_exporting_marker_restarts_export_from_scratch() {
    let h = Harness::new(FakeTool::default(), vec![BridgeSpec::new("a", "b", 100)]);

    // A previous run crashed mid-export.
    std::fs::create_dir_all(h.layout.exports_dir()).unwrap();
    std::fs::write(h.layout.exporting_marker("a", 100), "1700000000\n").unwrap();
    std::fs::write(h.layout.artifact("a", 100), "a:0-4").unwrap();

    let mut task = BridgeTask::for_range("a", "b", 100, &h.layout);
    assert_eq!(task.state, BridgeState::Exporting);

    let outcome = h.migrator.run(&mut task).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::Completed);
    assert_eq!(task.state, BridgeState::Done);
    assert_eq!(read(&h.layout.artifact("a", 100)), "a:0-100\n");
    assert_eq!(h.tool.full_exports(), [("a".to_string(), 0, 100)]);
    assert!(logs_contain("stale export marker found"));
}

#[tokio::test]
async fn test_failed_import_leaves_no_done_marker_and_retry_runs_from_top() {
    let h = Harness::new(FakeTool::default(), vec![BridgeSpec::new("a", "b", 100)]);
    *h.tool.fail_imports.lock().unwrap() = true;

    let err = h.migrator.migrate_range("a", "b", 100).await.unwrap_err();

    assert!(matches!(err, Error::RawBlock { .. }));
    assert!(!h.layout.done_marker("b", 100).exists());
    assert!(h.layout.importing_marker("b", 100).exists());
    assert_eq!(
        BridgeTask::for_range("a", "b", 100, &h.layout).state,
        BridgeState::Importing
    );
    // The source goes back online; the destination stays down.
    assert!(h.supervisor.is_running("a"));
    assert!(!h.supervisor.is_running("b"));

    *h.tool.fail_imports.lock().unwrap() = false;
    let outcome = h.migrator.migrate_range("a", "b", 100).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::Completed);
    assert_eq!(h.tool.full_exports().len(), 2);
    assert!(!h.layout.importing_marker("b", 100).exists());
    assert!(h.layout.done_marker("b", 100).exists());
}

#[tokio::test]
#[traced_test]
async fn test_source_missing_early_range_is_repaired_first() {
    let tool = FakeTool::default();
    tool.missing_early.lock().unwrap().insert("a".to_string());

    let mut bridge = BridgeSpec::new("a", "b", 100);
    bridge.repair_cutoff = Some(50);
    let h = Harness::new(tool, vec![bridge]);

    let outcome = h.migrator.migrate_range("a", "b", 100).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::Completed);
    assert!(h.layout.done_marker("a", 50).exists());
    assert!(h.layout.done_marker("b", 100).exists());
    assert_eq!(
        h.tool.full_exports(),
        [("root".to_string(), 0, 50), ("a".to_string(), 0, 100)]
    );
    assert_eq!(
        *h.tool.imports.lock().unwrap(),
        [
            ("a".to_string(), "root:0-50".to_string()),
            ("b".to_string(), "a:0-100".to_string())
        ]
    );
    assert!(!h.layout.probe_artifact("a").exists());
    assert!(logs_contain("repairing from upstream"));
}

#[tokio::test]
async fn test_repair_that_does_not_help_is_an_error() {
    let tool = FakeTool::default();
    tool.missing_early.lock().unwrap().insert("a".to_string());
    tool.unrepairable.lock().unwrap().insert("a".to_string());
    let h = Harness::new(tool, vec![BridgeSpec::new("a", "b", 100)]);

    let err = h.migrator.migrate_range("a", "b", 100).await.unwrap_err();

    assert!(matches!(err, Error::RepairIneffective { ref source_node, cutoff: 100 } if source_node == "a"));
    assert!(!h.layout.done_marker("b", 100).exists());

    // The repair itself completed and is not repeated.
    let err = h.migrator.migrate_range("a", "b", 100).await.unwrap_err();
    assert!(matches!(err, Error::RepairIneffective { .. }));
    assert_eq!(h.tool.import_count(), 1);
    assert!(h.supervisor.is_running("a"));
    assert!(h.supervisor.is_running("root"));
}

#[tokio::test]
async fn test_root_without_early_range_cannot_be_repaired() {
    let tool = FakeTool::default();
    tool.missing_early.lock().unwrap().insert("root".to_string());
    let h = Harness::new(tool, vec![]);

    let err = h.migrator.migrate_range("root", "a", 100).await.unwrap_err();

    assert!(matches!(err, Error::NoRepairSource(node) if node == "root"));
    // Stopped for the test export, started again afterwards.
    assert_eq!(
        h.supervisor.events_for("root"),
        [
            SupervisorEvent::Stop("root".to_string()),
            SupervisorEvent::Start("root".to_string())
        ]
    );
    assert!(h.supervisor.is_running("root"));
}

#[tokio::test]
async fn test_online_tool_leaves_source_running() {
    let tool = FakeTool {
        online: true,
        ..FakeTool::default()
    };
    let h = Harness::new(tool, vec![BridgeSpec::new("a", "b", 100)]);

    h.migrator.migrate_range("a", "b", 100).await.unwrap();

    assert!(h.supervisor.events_for("a").is_empty());
    assert_eq!(h.supervisor.stop_count("b"), 1);
}

#[tokio::test]
async fn test_cancelled_migration_does_not_complete() {
    let h = Harness::new(FakeTool::default(), vec![BridgeSpec::new("a", "b", 100)]);
    h.cancel.cancel();

    let err = h.migrator.migrate_range("a", "b", 100).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(!h.layout.done_marker("b", 100).exists());
    assert_eq!(h.tool.export_count(), 0);
    assert!(h.supervisor.is_running("a"));
}

#[tokio::test]
async fn test_unknown_node() {
    let h = Harness::new(FakeTool::default(), vec![]);

    let err = h.migrator.migrate_range("a", "zzz", 100).await.unwrap_err();

    assert!(matches!(err, Error::UnknownNode(node) if node == "zzz"));
}
