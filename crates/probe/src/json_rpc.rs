//! Minimal JSON-RPC 2.0 client over HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct Response {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

impl Response {
    fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC client bound to one endpoint.
#[derive(Debug)]
pub struct JsonRpcClient {
    client: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Creates a client with its own connection pool and a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Creates a client sharing an existing connection pool.
    #[must_use]
    pub const fn with_client(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Calls `method` and returns its result. A `null` result is returned as
    /// [`Value::Null`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success HTTP status, a
    /// malformed body or a JSON-RPC error object.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        trace!(endpoint = %self.endpoint, method, "json-rpc call");

        let response: Response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result(method)
    }

    /// Sends all `calls` in one batch request. Results are returned in the
    /// order of `calls`, each carrying its own success or JSON-RPC error.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch as a whole fails.
    pub async fn batch_call(&self, calls: &[(&str, Value)]) -> Result<Vec<Result<Value>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let first_id = self
            .next_id
            .fetch_add(calls.len() as u64, Ordering::Relaxed);
        let body: Vec<Value> = calls
            .iter()
            .zip(first_id..)
            .map(|((method, params), id)| {
                json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
            })
            .collect();

        trace!(endpoint = %self.endpoint, calls = calls.len(), "json-rpc batch");

        let responses: Vec<Response> = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut by_id: HashMap<u64, Response> = HashMap::with_capacity(responses.len());
        for response in responses {
            let id = response
                .id
                .ok_or_else(|| Error::Malformed("batch response without id".to_string()))?;
            by_id.insert(id, response);
        }

        Ok(calls
            .iter()
            .zip(first_id..)
            .map(|((method, _), id)| {
                by_id
                    .remove(&id)
                    .ok_or(Error::MissingResponse(id))
                    .and_then(|response| response.into_result(method))
            })
            .collect())
    }
}
