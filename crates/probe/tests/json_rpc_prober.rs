mod common;

use std::time::Duration;

use chainboot_probe::{
    HealthProber, HeightReport, JsonRpcClient, JsonRpcProber, JsonRpcProberOptions, Probe,
    serves_height_stably,
};
use chainboot_topology::NodeDescriptor;
use chainboot_util::port_allocator::unused_local_port;
use common::{StubNode, StubState};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use url::Url;

fn prober() -> JsonRpcProber {
    JsonRpcProber::new(JsonRpcProberOptions {
        timeout: Duration::from_secs(1),
    })
    .unwrap()
}

#[tokio::test]
async fn test_hex_height_not_syncing() {
    let stub = StubNode::start(StubState {
        block_number: Some(json!("0xfa0")),
        syncing: Some(json!(false)),
        peer_count: Some(json!("0x3")),
        ..StubState::default()
    })
    .await;

    let probe = prober().probe(&stub.descriptor("a")).await;

    assert_eq!(probe, Probe::Report(HeightReport::synced(4000, 3)));
}

#[tokio::test]
async fn test_decimal_height_without_sync_or_peer_methods() {
    let stub = StubNode::start(StubState {
        block_number: Some(json!("4000")),
        ..StubState::default()
    })
    .await;

    let probe = prober().probe(&stub.descriptor("a")).await;

    assert_eq!(probe, Probe::Report(HeightReport::synced(4000, 0)));
}

#[tokio::test]
async fn test_syncing_object_and_null_sync_result() {
    let stub = StubNode::start(StubState {
        block_number: Some(json!(0)),
        syncing: Some(json!({"startingBlock": "0x0", "currentBlock": "0x4b0", "highestBlock": "0x1388"})),
        peer_count: Some(json!(2)),
        ..StubState::default()
    })
    .await;

    let report = *prober().probe(&stub.descriptor("a")).await.report().unwrap();
    assert!(report.is_syncing);
    assert_eq!(report.effective_head(), 1200);
    assert_eq!(report.target(), 5000);

    stub.state.lock().unwrap().syncing = Some(serde_json::Value::Null);
    let report = *prober().probe(&stub.descriptor("a")).await.report().unwrap();
    assert!(!report.is_syncing);
}

#[tokio::test]
#[traced_test]
async fn test_connection_refused_is_unavailable() {
    let port = unused_local_port();
    let node = NodeDescriptor::new(
        "gone",
        Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap(),
        "/data/gone",
    );

    assert_eq!(prober().probe(&node).await, Probe::Unavailable);
    assert_eq!(prober().block_hash(&node, 1).await, None);
}

#[tokio::test]
async fn test_unparseable_height_is_unavailable() {
    let stub = StubNode::start(StubState {
        block_number: Some(json!({"height": 1})),
        ..StubState::default()
    })
    .await;

    assert_eq!(prober().probe(&stub.descriptor("a")).await, Probe::Unavailable);
}

#[tokio::test]
async fn test_block_hash_and_stability() {
    let stub = StubNode::start(StubState {
        block_number: Some(json!("0x65")),
        ..StubState::default()
    })
    .await;
    stub.set_hash(100, "0xaaaa");

    let prober = prober();
    let node = stub.descriptor("a");
    let cancel = CancellationToken::new();

    assert_eq!(prober.block_hash(&node, 100).await.as_deref(), Some("0xaaaa"));
    assert_eq!(prober.block_hash(&node, 101).await, None);
    assert!(
        serves_height_stably(&prober, &node, 100, Duration::from_millis(10), &cancel).await
    );
    assert!(
        !serves_height_stably(&prober, &node, 101, Duration::from_millis(10), &cancel).await
    );
}

#[tokio::test]
async fn test_batch_call_preserves_order_and_errors() {
    let stub = StubNode::start(StubState::default()).await;
    let client = JsonRpcClient::new(stub.url.clone(), Duration::from_secs(1)).unwrap();

    let results = client
        .batch_call(&[
            ("debug_getRawBlock", json!(["0x1"])),
            ("eth_unknown", json!([])),
            ("debug_getRawBlock", json!(["0x2"])),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap(), &json!("0xc001"));
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap(), &json!("0xc002"));
}
