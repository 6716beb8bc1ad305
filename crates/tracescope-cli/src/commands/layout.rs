//! Layout command implementation
//!
//! Reports the slot and bit offset the storage rules assign to each declared
//! variable.

use crate::cli::OutputFormat;
use crate::formatters::{format_json, load_layout, write_output};
use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;
use tracescope_ethereum::{format_slot, StorageLayoutWalker};
use tracing::info;

/// Execute layout command
pub fn cmd_layout(layout_file: &Path, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    info!("Placing variables from {}", layout_file.display());
    let layout = load_layout(layout_file)?;

    let mut walker = StorageLayoutWalker::new(&layout.structs);
    let placements = walker.place_all(&layout.variables)?;

    let variables: Vec<Value> = placements
        .iter()
        .map(|placement| {
            json!({
                "name": placement.variable.name,
                "type": placement.variable.type_name.type_string(),
                "slot": format_slot(placement.slot),
                "offset": placement.offset_bits,
                "bits": placement.footprint.bits(),
                "slots": placement.footprint.slot_count().to_string(),
            })
        })
        .collect();

    let output_structure = json!({
        "contractName": layout.contract_name,
        "variables": variables,
        "structs": layout.used_struct_catalog(),
        "arrays": layout.array_catalog(),
    });

    let content = format_json(&output_structure, format)?;
    write_output(&content, output)?;

    info!(
        "Layout of {}: {} variables over {} slots",
        layout.contract_name,
        placements.len(),
        walker.span()
    );

    Ok(())
}
