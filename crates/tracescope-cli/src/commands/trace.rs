//! Trace command implementation
//!
//! Fetches (or reads) raw `callTracer` output and writes the normalized trace
//! response.

use crate::cli::OutputFormat;
use crate::config::CliConfig;
use crate::formatters::{
    format_json, load_json_value, load_preimages, report_diagnostics, write_output,
};
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracescope_ethereum::{JsonRpcTraceSource, StaticContractRegistry, TraceAssembler};
use tracing::{info, warn};

/// Arguments of the trace command
#[derive(Debug, Clone)]
pub struct TraceRequest<'a> {
    pub txhash: &'a str,
    pub chain: &'a str,
    pub input: Option<&'a Path>,
    pub rpc_url: Option<&'a str>,
    pub preimages: Option<&'a Path>,
    pub registry: Option<&'a Path>,
    pub max_depth: Option<usize>,
    pub output: Option<&'a Path>,
    pub format: OutputFormat,
}

/// Execute trace command
pub async fn cmd_trace(request: TraceRequest<'_>, config: &CliConfig) -> Result<()> {
    info!("Tracing {} on {}", request.txhash, request.chain);

    let registry = match request.registry.or(config.registry.as_deref()) {
        Some(path) => {
            info!("Loading contract registry from {}", path.display());
            StaticContractRegistry::from_file(path)?
        }
        None => StaticContractRegistry::new(),
    };

    let mut assembler = TraceAssembler::new().with_registry(registry);
    if let Some(max_depth) = request.max_depth.or(config.max_depth) {
        assembler = assembler.with_max_depth(max_depth);
    }
    if let Some(label) = &config.default_label {
        assembler = assembler.with_default_label(label.clone());
    }

    let raw: Value = match request.input {
        Some(path) => {
            info!("Reading call trace from {}", path.display());
            load_json_value(path)?
        }
        None => {
            let source =
                JsonRpcTraceSource::new(config.endpoints(request.chain, request.rpc_url));
            source
                .fetch_call_trace_async(request.chain, request.txhash)
                .await?
        }
    };

    let preimages = match request.preimages {
        Some(path) => load_preimages(path)?,
        None => BTreeMap::new(),
    };

    let assembled =
        assembler.assemble_with_preimages(request.chain, request.txhash, &raw, preimages)?;
    report_diagnostics(&assembled.diagnostics);

    let content = format_json(&assembled.response, request.format)?;
    write_output(&content, request.output)?;

    let calls = assembled.response.entrypoint.calls().count();
    let addresses = assembled.response.addresses.len();
    if assembled.is_complete() {
        info!(
            "Trace resolved: {} calls, {} addresses",
            calls, addresses
        );
    } else {
        warn!(
            "Trace partially resolved: {} calls, {} addresses, {} diagnostics",
            calls,
            addresses,
            assembled.diagnostics.len()
        );
    }

    Ok(())
}
