//! Output formatting and input loading utilities
//!
//! This module provides functions for reading JSON inputs and handling output
//! to files or stdout.

use crate::cli::OutputFormat;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracescope_core::{ContractLayout, Diagnostic};
use tracescope_ethereum::parse_trace_json;
use tracing::warn;

/// Helper function to write output to file or stdout
pub fn write_output(content: &str, output_path: Option<&Path>) -> Result<()> {
    if let Some(path) = output_path {
        std::fs::write(path, content)?;
        println!("Output written to {}", path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

/// Read and parse a JSON file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))
}

/// Read a JSON file of any nesting depth, such as a raw call trace
pub fn load_json_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
    parse_trace_json(&content)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))
}

/// Helper function to load layout from file
pub fn load_layout(layout_path: &Path) -> Result<ContractLayout> {
    load_json(layout_path)
}

/// Load a preimage table
///
/// Accepts either a bare `hash -> preimage` object or a trace response, whose
/// `preimages` field is used.
pub fn load_preimages(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut value = load_json_value(path)?;
    let is_response = value.get("entrypoint").is_some();
    let table = match value.get_mut("preimages").filter(|_| is_response) {
        Some(preimages) => preimages.take(),
        None => value,
    };
    serde_json::from_value(table).map_err(|e| {
        anyhow::anyhow!(
            "{} is not a map of hex hashes to hex preimages: {}",
            path.display(),
            e
        )
    })
}

pub fn format_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value).map_err(Into::into),
        OutputFormat::Json => serde_json::to_string(value).map_err(Into::into),
    }
}

/// Emit every diagnostic as a warning
pub fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!("{}", diagnostic);
    }
}
