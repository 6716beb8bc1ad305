//! JSON-RPC trace source
//!
//! Fetches `debug_traceTransaction` output using the built-in `callTracer`
//! with logs enabled. One endpoint URL is configured per chain name.

use crate::normalizer::parse_trace_json;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracescope_core::{is_valid_tx_hash, TraceError, TraceSource};
use tracing::debug;

/// Trace source backed by node JSON-RPC endpoints
#[derive(Debug, Clone, Default)]
pub struct JsonRpcTraceSource {
    endpoints: BTreeMap<String, String>,
}

impl JsonRpcTraceSource {
    pub fn new(endpoints: BTreeMap<String, String>) -> Self {
        Self { endpoints }
    }

    /// Source with a single chain endpoint
    pub fn single(chain: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(chain.into(), rpc_url.into());
        Self { endpoints }
    }

    pub fn endpoint(&self, chain: &str) -> Result<&str, TraceError> {
        self.endpoints
            .get(chain)
            .map(String::as_str)
            .ok_or_else(|| TraceError::NotFound(format!("no RPC endpoint for chain '{}'", chain)))
    }

    /// Async implementation of trace fetching
    pub async fn fetch_call_trace_async(
        &self,
        chain: &str,
        txhash: &str,
    ) -> Result<Value, TraceError> {
        if !is_valid_tx_hash(txhash) {
            return Err(TraceError::InvalidInput(format!(
                "transaction hash must be 0x followed by 64 hex digits, got '{}'",
                txhash
            )));
        }
        let url = self.endpoint(chain)?;
        debug!("Requesting call trace for {} from {}", txhash, chain);

        let rpc_request = json!({
            "jsonrpc": "2.0",
            "method": "debug_traceTransaction",
            "params": [txhash, { "tracer": "callTracer", "tracerConfig": { "withLog": true } }],
            "id": 1
        });

        let client = reqwest::Client::new();
        let response = client
            .post(url)
            .json(&rpc_request)
            .send()
            .await
            .map_err(|e| TraceError::transport(format!("RPC request failed: {}", e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| TraceError::transport(format!("RPC request failed: {}", e)))?;
        let rpc_response = parse_trace_json(&body)
            .map_err(|e| TraceError::transport(format!("Failed to parse RPC response: {}", e)))?;

        interpret_response(txhash, rpc_response)
    }
}

/// Map a JSON-RPC envelope to the trace result or a typed error
fn interpret_response(txhash: &str, mut rpc_response: Value) -> Result<Value, TraceError> {
    if let Some(error) = rpc_response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown RPC error");
        if message.to_ascii_lowercase().contains("not found") {
            return Err(TraceError::NotFound(format!("{}: {}", txhash, message)));
        }
        return Err(TraceError::transport(message));
    }

    match rpc_response.get_mut("result").map(Value::take) {
        None | Some(Value::Null) => Err(TraceError::NotFound(format!(
            "no trace returned for {}",
            txhash
        ))),
        Some(result) => Ok(result),
    }
}

impl TraceSource for JsonRpcTraceSource {
    fn fetch_call_trace(&self, chain: &str, txhash: &str) -> Result<Value, TraceError> {
        match tokio::runtime::Handle::try_current() {
            Ok(_handle) => {
                // Already inside a runtime: block on a fresh one in another thread
                let source = self.clone();
                let chain = chain.to_string();
                let txhash = txhash.to_string();
                std::thread::spawn(move || {
                    let rt = tokio::runtime::Runtime::new().map_err(|e| {
                        TraceError::transport(format!("Failed to create runtime: {}", e))
                    })?;
                    rt.block_on(source.fetch_call_trace_async(&chain, &txhash))
                })
                .join()
                .map_err(|_| TraceError::transport("Thread panicked"))?
            }
            Err(_) => {
                let rt = tokio::runtime::Runtime::new().map_err(|e| {
                    TraceError::transport(format!("Failed to create runtime: {}", e))
                })?;
                rt.block_on(self.fetch_call_trace_async(chain, txhash))
            }
        }
    }
}
