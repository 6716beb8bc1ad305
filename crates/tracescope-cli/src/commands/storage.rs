//! Storage command implementation
//!
//! Classifies touched slots of one contract against its declared layout.

use crate::cli::OutputFormat;
use crate::formatters::{
    format_json, load_json, load_layout, load_preimages, report_diagnostics, write_output,
};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracescope_ethereum::build_storage_response;
use tracing::{info, warn};

/// Execute storage command
pub fn cmd_storage(
    layout_file: &Path,
    slots: &[String],
    slots_file: Option<&Path>,
    preimages_file: Option<&Path>,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    info!("Classifying storage slots using {}", layout_file.display());
    let layout = load_layout(layout_file)?;

    let mut touched = slots.to_vec();
    if let Some(path) = slots_file {
        let listed: Vec<String> = load_json(path)?;
        touched.extend(listed);
    }
    if touched.is_empty() {
        return Err(anyhow::anyhow!("No slots given, use --slot or --slots-file"));
    }

    let preimages = match preimages_file {
        Some(path) => load_preimages(path)?,
        None => BTreeMap::new(),
    };

    let resolution = build_storage_response(&layout, &touched, &preimages);
    report_diagnostics(&resolution.diagnostics);

    let content = format_json(&resolution.response, format)?;
    write_output(&content, output)?;

    let total = resolution.response.slots.len();
    let resolved = resolution.response.resolved_count();
    if resolution.diagnostics.is_empty() && resolved == total {
        info!("Storage resolved: {} of {} slots in {}", resolved, total, layout.contract_name);
    } else {
        warn!(
            "Storage partially resolved: {} of {} slots in {}, {} diagnostics",
            resolved,
            total,
            layout.contract_name,
            resolution.diagnostics.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(value: &Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    fn layout_file() -> NamedTempFile {
        json_file(&json!({
            "contractName": "Counter",
            "variables": [
                { "name": "count", "typeName": { "kind": "elementary", "name": "uint128" } },
                { "name": "step", "typeName": { "kind": "elementary", "name": "uint128" } }
            ]
        }))
    }

    #[test]
    fn test_storage_command() {
        let layout = layout_file();
        let slots_file = json_file(&json!(["0x1"]));
        let output = NamedTempFile::new().unwrap();

        cmd_storage(
            layout.path(),
            &["0".to_string()],
            Some(slots_file.path()),
            None,
            Some(output.path()),
            OutputFormat::Json,
        )
        .unwrap();

        let written: Value = load_json(output.path()).unwrap();
        let slot_zero = &written["slots"][format!("0x{}", "0".repeat(64))];
        assert_eq!(slot_zero["type"], "raw");
        assert_eq!(slot_zero["variables"]["0"]["name"], "count");
        assert_eq!(slot_zero["variables"]["128"]["name"], "step");

        let slot_one = &written["slots"][format!("0x{}1", "0".repeat(63))];
        assert_eq!(slot_one["resolved"], false);
    }

    #[test]
    fn test_storage_requires_slots() {
        let layout = layout_file();
        let err = cmd_storage(layout.path(), &[], None, None, None, OutputFormat::Pretty).unwrap_err();
        assert!(err.to_string().contains("No slots"));
    }
}
