//! In-process JSON-RPC stub node.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chainboot_topology::NodeDescriptor;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

/// What the stub answers. `None` makes the method unsupported.
#[derive(Debug, Clone, Default)]
pub struct StubState {
    pub block_number: Option<Value>,
    pub syncing: Option<Value>,
    pub peer_count: Option<Value>,
    pub hashes: HashMap<u64, String>,
}

pub struct StubNode {
    pub url: Url,
    pub state: Arc<Mutex<StubState>>,
}

impl StubNode {
    pub async fn start(state: StubState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new()
            .route("/", post(handle))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{addr}/")).unwrap(),
            state,
        }
    }

    pub fn descriptor(&self, name: &str) -> NodeDescriptor {
        NodeDescriptor::new(name, self.url.clone(), format!("/data/{name}"))
    }

    pub fn set_hash(&self, height: u64, hash: &str) {
        self.state
            .lock()
            .unwrap()
            .hashes
            .insert(height, hash.to_string());
    }
}

async fn handle(State(state): State<Arc<Mutex<StubState>>>, Json(body): Json<Value>) -> Json<Value> {
    let state = state.lock().unwrap().clone();
    match body {
        Value::Array(calls) => Json(Value::Array(
            calls.iter().map(|call| answer(&state, call)).collect(),
        )),
        call => Json(answer(&state, &call)),
    }
}

fn answer(state: &StubState, call: &Value) -> Value {
    let id = call["id"].clone();
    let method = call["method"].as_str().unwrap_or_default();
    let params = &call["params"];

    let result = match method {
        "eth_blockNumber" => state.block_number.clone(),
        "eth_syncing" => state.syncing.clone(),
        "net_peerCount" => state.peer_count.clone(),
        "eth_getBlockByNumber" => {
            let height = params[0]
                .as_str()
                .and_then(|h| u64::from_str_radix(h.trim_start_matches("0x"), 16).ok())
                .unwrap_or(u64::MAX);
            Some(
                state
                    .hashes
                    .get(&height)
                    .map_or(Value::Null, |hash| json!({"number": params[0], "hash": hash})),
            )
        }
        "debug_getRawBlock" => {
            let height = params[0]
                .as_str()
                .and_then(|h| u64::from_str_radix(h.trim_start_matches("0x"), 16).ok())
                .unwrap_or_default();
            Some(json!(format!("0xc0{height:02x}")))
        }
        _ => None,
    };

    match result {
        Some(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        None => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("the method {method} does not exist/is not available")}
        }),
    }
}
