//! End-to-end checks on the `tracescope` binary's output streams

use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tracescope"))
        .args(args)
        .output()
        .expect("Failed to run tracescope")
}

fn layout_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "contractName": "Counter",
            "variables": [
                {{ "name": "count", "typeName": {{ "kind": "elementary", "name": "uint256" }} }},
                {{ "name": "owner", "typeName": {{ "kind": "elementary", "name": "address" }} }}
            ],
            "structs": []
        }}"#
    )
    .unwrap();
    file
}

#[test]
fn test_stdout_carries_only_json() {
    let layout = layout_file();
    let output = run(&["layout", "--format", "json", layout.path().to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(parsed["contractName"], "Counter");
    assert_eq!(parsed["variables"][1]["slot"], format!("0x{:064x}", 1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Placing variables"));
}

#[test]
fn test_failure_is_logged_to_stderr() {
    let output = run(&["layout", "/nonexistent/layout.json"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot read"));
}
