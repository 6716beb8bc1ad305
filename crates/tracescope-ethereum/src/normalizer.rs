//! Conversion of raw call tracer output into [`TraceEntryCall`] trees
//!
//! The input is the JSON produced by geth's `callTracer` (optionally with
//! `withLog`). Each call object may carry `calls` and `logs`; logs carry a
//! `position` telling how many sibling calls precede them. Children are
//! emitted in execution order and numbered among all siblings, so with no
//! logs the k-th raw call gets path `parent.k`.
//!
//! The tree is walked with an explicit stack of open frames, so adversarially
//! deep traces cannot exhaust the native stack. Raw traces should be read with
//! [`parse_trace_json`], which lifts serde_json's nesting limit.

use crate::address::{is_precompile, normalize_address, AddressRegistry};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracescope_core::{
    CallStatus, CallVariant, Diagnostic, DiagnosticKind, TraceEntry, TraceEntryCall,
    TraceEntryLog, TraceError, UNKNOWN_CODEHASH,
};

/// Value reported for calls that carry no `value` field
pub const ZERO_VALUE: &str = "0x0";

/// A normalized subtree and the per-field problems found while building it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCall {
    pub entry: TraceEntryCall,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds [`TraceEntryCall`] trees from raw tracer call objects
#[derive(Debug, Clone, Copy, Default)]
pub struct CallTreeNormalizer {
    max_depth: Option<usize>,
}

impl CallTreeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject trees nested deeper than `max_depth` calls (the root is depth 1)
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Normalize one raw call object and everything below it
    ///
    /// Every non-empty `from`/`to` in the subtree is added to `registry`.
    /// Malformed fields degrade to defaults and are reported as diagnostics;
    /// the only error is [`TraceError::TraceTooDeep`] when a depth limit is set.
    ///
    /// # Arguments
    ///
    /// * `raw` - The tracer's call object
    /// * `path` - Path to assign to `raw`, `"0"` for a transaction root
    /// * `registry` - Collects the addresses seen
    pub fn normalize(
        &self,
        raw: &Map<String, Value>,
        path: &str,
        registry: &mut AddressRegistry,
    ) -> Result<NormalizedCall, TraceError> {
        let mut diagnostics = Vec::new();
        let mut parents: Vec<Frame<'_>> = Vec::new();
        let mut current = Frame::open(raw, path.to_string(), registry, &mut diagnostics);

        loop {
            match current.pending.next() {
                Some(Pending::Log(log)) => current.call.children.push(TraceEntry::Log(log)),
                Some(Pending::Call { raw, path }) => {
                    let depth = parents.len() + 2;
                    if let Some(max_depth) = self.max_depth {
                        if depth > max_depth {
                            return Err(TraceError::TraceTooDeep { max_depth });
                        }
                    }
                    let child = Frame::open(raw, path, registry, &mut diagnostics);
                    parents.push(std::mem::replace(&mut current, child));
                }
                None => {
                    let finished = current.call;
                    match parents.pop() {
                        Some(mut parent) => {
                            parent.call.children.push(TraceEntry::Call(finished));
                            current = parent;
                        }
                        None => {
                            return Ok(NormalizedCall {
                                entry: finished,
                                diagnostics,
                            })
                        }
                    }
                }
            }
        }
    }
}

/// Child waiting to be attached to an open frame
enum Pending<'a> {
    Call {
        raw: &'a Map<String, Value>,
        path: String,
    },
    Log(TraceEntryLog),
}

/// A call whose scalar fields are decoded but whose children are still pending
struct Frame<'a> {
    call: TraceEntryCall,
    pending: std::vec::IntoIter<Pending<'a>>,
}

impl<'a> Frame<'a> {
    fn open(
        raw: &'a Map<String, Value>,
        path: String,
        registry: &mut AddressRegistry,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let text = |field: &str| raw.get(field).and_then(Value::as_str);

        let from = text("from").map(normalize_address).unwrap_or_default();
        let to = text("to").map(normalize_address).unwrap_or_default();
        registry.add(&from);
        registry.add(&to);

        let variant = match text("type") {
            None => CallVariant::Call,
            Some(raw_type) => CallVariant::from_raw(raw_type).unwrap_or_else(|| {
                diagnostics.push(Diagnostic::new(
                    path.clone(),
                    DiagnosticKind::UnknownCallType {
                        raw: raw_type.to_string(),
                    },
                ));
                CallVariant::Call
            }),
        };

        let status = match raw.get("error") {
            Some(error) if !error.is_null() => CallStatus::Reverted,
            _ => CallStatus::Succeeded,
        };

        let gas = decode_quantity(raw, "gas", &path, diagnostics);
        let gas_used = decode_quantity(raw, "gasUsed", &path, diagnostics);
        let pending = plan_children(raw, &path, diagnostics);

        let call = TraceEntryCall {
            variant,
            gas,
            is_precompile: is_precompile(&to),
            input: text("input").unwrap_or("0x").to_string(),
            output: text("output").unwrap_or("0x").to_string(),
            gas_used,
            value: text("value").unwrap_or(ZERO_VALUE).to_string(),
            status,
            codehash: UNKNOWN_CODEHASH.to_string(),
            children: Vec::new(),
            from,
            to,
            path,
        };

        Frame {
            call,
            pending: pending.into_iter(),
        }
    }
}

/// Decode a hex quantity field, falling back to zero with a diagnostic
fn decode_quantity(
    raw: &Map<String, Value>,
    field: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> u64 {
    let decoded = match raw.get(field) {
        None | Some(Value::Null) => return 0,
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => parse_hex_quantity(text),
        Some(_) => None,
    };

    decoded.unwrap_or_else(|| {
        let raw_text = match raw.get(field) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        diagnostics.push(Diagnostic::new(
            path,
            DiagnosticKind::NumericDecode {
                field: field.to_string(),
                raw: raw_text,
            },
        ));
        0
    })
}

/// Parse a `0x`-prefixed hex quantity; `"0x"` alone is zero
pub fn parse_hex_quantity(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    if digits.is_empty() {
        return Some(0);
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parse tracer output of any nesting depth
///
/// Each call frame costs two JSON nesting levels (the object and its `calls`
/// array), so serde_json's default limit of 128 would reject traces deeper
/// than about 63 calls. The limit is lifted and the stack grows on demand.
pub fn parse_trace_json(text: &str) -> Result<Value, serde_json::Error> {
    let mut json = serde_json::Deserializer::from_str(text);
    json.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(value)
}

/// Order a call's raw children by execution and assign their paths
fn plan_children<'a>(
    raw: &'a Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Pending<'a>> {
    let mut calls = Vec::new();
    if let Some(raw_calls) = raw.get("calls").and_then(Value::as_array) {
        for (index, child) in raw_calls.iter().enumerate() {
            match child.as_object() {
                Some(child) => calls.push(child),
                None => diagnostics.push(Diagnostic::new(
                    path,
                    DiagnosticKind::SkippedChild { index },
                )),
            }
        }
    }

    let mut logs: Vec<(usize, TraceEntryLog)> = Vec::new();
    if let Some(raw_logs) = raw.get("logs").and_then(Value::as_array) {
        for (index, log) in raw_logs.iter().enumerate() {
            let Some(log) = log.as_object() else {
                diagnostics.push(Diagnostic::new(path, DiagnosticKind::SkippedLog { index }));
                continue;
            };
            let position = log_position(log).unwrap_or(calls.len()).min(calls.len());
            logs.push((position, decode_log(log)));
        }
    }
    // Stable, so logs sharing a position keep their emission order
    logs.sort_by_key(|(position, _)| *position);

    let mut planned = Vec::with_capacity(calls.len() + logs.len());
    let mut logs = logs.into_iter().peekable();
    for position in 0..=calls.len() {
        while let Some((_, log)) = logs.next_if(|(at, _)| *at == position) {
            planned.push(Pending::Log(log));
        }
        if let Some(&call) = calls.get(position) {
            planned.push(Pending::Call {
                raw: call,
                path: String::new(),
            });
        }
    }

    for (index, entry) in planned.iter_mut().enumerate() {
        let child_path = format!("{}.{}", path, index);
        match entry {
            Pending::Call { path: assigned, .. } => *assigned = child_path,
            Pending::Log(log) => log.path = child_path,
        }
    }
    planned
}

fn log_position(log: &Map<String, Value>) -> Option<usize> {
    match log.get("position")? {
        Value::Number(number) => number.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(text) => parse_hex_quantity(text).and_then(|n| usize::try_from(n).ok()),
        _ => None,
    }
}

fn decode_log(log: &Map<String, Value>) -> TraceEntryLog {
    TraceEntryLog {
        path: String::new(),
        topics: log
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        data: log
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or("0x")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected JSON object"),
        }
    }

    #[test]
    fn test_leaf_call() {
        let raw = object(json!({
            "from": "0xA", "to": "0xB", "gas": "0x10", "gasUsed": "0x5",
            "input": "0x", "output": "0x", "type": "CALL"
        }));
        let mut registry = AddressRegistry::new();
        let result = CallTreeNormalizer::new().normalize(&raw, "0", &mut registry).unwrap();

        let call = result.entry;
        assert_eq!(call.path, "0");
        assert_eq!(call.gas, 16);
        assert_eq!(call.gas_used, 5);
        assert_eq!(call.from, "0xa");
        assert_eq!(call.to, "0xb");
        assert_eq!(call.status, CallStatus::Succeeded);
        assert_eq!(call.value, ZERO_VALUE);
        assert_eq!(call.codehash, "0x");
        assert!(call.children.is_empty());
        assert!(result.diagnostics.is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_nested_paths_follow_call_order() {
        let raw = object(json!({
            "from": "0xa", "to": "0xb", "gas": "0x0", "gasUsed": "0x0",
            "calls": [
                { "from": "0xb", "to": "0xc", "calls": [ { "from": "0xc", "to": "0xd" } ] },
                { "from": "0xb", "to": "0xe" }
            ]
        }));
        let mut registry = AddressRegistry::new();
        let call = CallTreeNormalizer::new()
            .normalize(&raw, "0", &mut registry)
            .unwrap()
            .entry;

        let paths: Vec<&str> = call.calls().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["0", "0.0", "0.0.0", "0.1"]);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_bad_gas_degrades_to_zero() {
        let raw = object(json!({ "from": "0xa", "to": "0xb", "gas": "0xzz", "gasUsed": "0x" }));
        let mut registry = AddressRegistry::new();
        let result = CallTreeNormalizer::new().normalize(&raw, "0", &mut registry).unwrap();

        assert_eq!(result.entry.gas, 0);
        assert_eq!(result.entry.gas_used, 0);
        assert_eq!(result.diagnostics.len(), 1);
        match &result.diagnostics[0].kind {
            DiagnosticKind::NumericDecode { field, raw } => {
                assert_eq!(field, "gas");
                assert_eq!(raw, "0xzz");
            }
            _ => panic!("Expected numeric decode diagnostic"),
        }
    }

    #[test]
    fn test_error_field_marks_revert() {
        let raw = object(json!({
            "from": "0xa", "to": "0xb", "error": "execution reverted", "type": "DELEGATECALL"
        }));
        let mut registry = AddressRegistry::new();
        let call = CallTreeNormalizer::new()
            .normalize(&raw, "0", &mut registry)
            .unwrap()
            .entry;
        assert_eq!(call.status, CallStatus::Reverted);
        assert_eq!(call.variant, CallVariant::Delegatecall);
    }

    #[test]
    fn test_unknown_call_type_is_reported() {
        let raw = object(json!({ "from": "0xa", "to": "0xb", "type": "TELEPORT" }));
        let mut registry = AddressRegistry::new();
        let result = CallTreeNormalizer::new().normalize(&raw, "0", &mut registry).unwrap();
        assert_eq!(result.entry.variant, CallVariant::Call);
        assert!(matches!(
            result.diagnostics[0].kind,
            DiagnosticKind::UnknownCallType { .. }
        ));
    }

    #[test]
    fn test_logs_interleave_by_position() {
        let raw = object(json!({
            "from": "0xa", "to": "0xb",
            "calls": [ { "from": "0xb", "to": "0xc" }, { "from": "0xb", "to": "0xd" } ],
            "logs": [
                { "topics": ["0x01"], "data": "0xaa", "position": "0x1" },
                { "topics": [], "data": "0xbb", "position": "0x2" },
                { "topics": [], "data": "0xcc" }
            ]
        }));
        let mut registry = AddressRegistry::new();
        let call = CallTreeNormalizer::new()
            .normalize(&raw, "0", &mut registry)
            .unwrap()
            .entry;

        let shape: Vec<(&str, &str)> = call
            .children
            .iter()
            .map(|child| (child.kind(), child.path()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("call", "0.0"),
                ("log", "0.1"),
                ("call", "0.2"),
                ("log", "0.3"),
                ("log", "0.4"),
            ]
        );
        match &call.children[1] {
            TraceEntry::Log(log) => {
                assert_eq!(log.topics, vec!["0x01".to_string()]);
                assert_eq!(log.data, "0xaa");
            }
            _ => panic!("Expected log entry"),
        }
    }

    #[test]
    fn test_non_object_children_are_skipped() {
        let raw = object(json!({
            "from": "0xa", "to": "0xb",
            "calls": [ 42, { "from": "0xb", "to": "0xc" } ]
        }));
        let mut registry = AddressRegistry::new();
        let result = CallTreeNormalizer::new().normalize(&raw, "0", &mut registry).unwrap();

        assert_eq!(result.entry.children.len(), 1);
        assert_eq!(result.entry.children[0].path(), "0.0");
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::new("0", DiagnosticKind::SkippedChild { index: 0 })]
        );
    }

    #[test]
    fn test_max_depth() {
        let raw = object(json!({
            "from": "0xa", "to": "0xb",
            "calls": [ { "from": "0xb", "to": "0xc", "calls": [ { "from": "0xc", "to": "0xd" } ] } ]
        }));
        let mut registry = AddressRegistry::new();

        let ok = CallTreeNormalizer::new()
            .with_max_depth(3)
            .normalize(&raw, "0", &mut registry);
        assert!(ok.is_ok());

        let err = CallTreeNormalizer::new()
            .with_max_depth(2)
            .normalize(&raw, "0", &mut registry);
        assert!(matches!(err, Err(TraceError::TraceTooDeep { max_depth: 2 })));
    }

    fn call_object(from: &str, to: &str) -> Map<String, Value> {
        let mut call = Map::new();
        call.insert("from".to_string(), Value::String(from.to_string()));
        call.insert("to".to_string(), Value::String(to.to_string()));
        call
    }

    /// Nested `calls` chain `depth` frames deep, as tracer JSON text
    fn deep_chain_text(depth: usize) -> String {
        let frame = r#"{"from":"0xa","to":"0xb","gas":"0x1","gasUsed":"0x1","calls":["#;
        let mut text = frame.repeat(depth - 1);
        text.push_str(r#"{"from":"0xa","to":"0xb"}"#);
        text.push_str(&"]}".repeat(depth - 1));
        text
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut raw = call_object("0xa", "0xb");
        for _ in 0..1_000 {
            let mut parent = call_object("0xa", "0xb");
            parent.insert(
                "calls".to_string(),
                Value::Array(vec![Value::Object(raw)]),
            );
            raw = parent;
        }
        let mut registry = AddressRegistry::new();
        let call = CallTreeNormalizer::new()
            .normalize(&raw, "0", &mut registry)
            .unwrap()
            .entry;
        assert_eq!(call.calls().count(), 1_001);

        // Both trees are deeper than a test thread can drop recursively
        std::mem::forget(call);
        std::mem::forget(raw);
    }

    #[test]
    fn test_parse_deep_trace_text() {
        let raw = parse_trace_json(&deep_chain_text(500)).unwrap();
        let mut registry = AddressRegistry::new();
        let result = CallTreeNormalizer::new()
            .normalize(raw.as_object().unwrap(), "0", &mut registry)
            .unwrap();

        assert!(result.diagnostics.is_empty());
        assert_eq!(result.entry.calls().count(), 500);
        let deepest = result.entry.calls().last().unwrap();
        assert_eq!(deepest.path.split('.').count(), 500);

        std::mem::forget(result);
        std::mem::forget(raw);
    }

    #[test]
    fn test_parse_trace_json_rejects_trailing_data() {
        assert!(parse_trace_json(r#"{"from":"0xa"}"#).is_ok());
        assert!(parse_trace_json(r#"{"from":"0xa"} {}"#).is_err());
        assert!(parse_trace_json(r#"{"from":"0xa""#).is_err());
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x10"), Some(16));
        assert_eq!(parse_hex_quantity("0XFF"), Some(255));
        assert_eq!(parse_hex_quantity("0x"), Some(0));
        assert_eq!(parse_hex_quantity("0xg"), None);
        assert_eq!(parse_hex_quantity("ff"), None);
        assert_eq!(parse_hex_quantity("0x+ff"), None);
        assert_eq!(parse_hex_quantity("+0xff"), None);
        assert_eq!(parse_hex_quantity("0x10000000000000000"), None);
    }
}
