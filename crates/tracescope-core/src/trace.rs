//! Normalized call trace model
//!
//! These types are the wire format returned for a traced transaction. Every
//! entry carries a dotted `path` (`"0"`, `"0.1"`, `"0.1.0"`, ...) giving its
//! position in the tree, and entries are discriminated by a lowercase `type`
//! field on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Path of the root call in every trace
pub const ROOT_PATH: &str = "0";

/// Codehash placeholder used when the executing code is not known
pub const UNKNOWN_CODEHASH: &str = "0x";

/// Kind of EVM message call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallVariant {
    #[default]
    Call,
    Staticcall,
    Delegatecall,
    Callcode,
    Create,
    Create2,
    Selfdestruct,
}

impl CallVariant {
    /// Parse a tracer call type, ignoring case (`CALL`, `DelegateCall`, ...)
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "call" => Some(CallVariant::Call),
            "staticcall" => Some(CallVariant::Staticcall),
            "delegatecall" => Some(CallVariant::Delegatecall),
            "callcode" => Some(CallVariant::Callcode),
            "create" => Some(CallVariant::Create),
            "create2" => Some(CallVariant::Create2),
            "selfdestruct" => Some(CallVariant::Selfdestruct),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallVariant::Call => "call",
            CallVariant::Staticcall => "staticcall",
            CallVariant::Delegatecall => "delegatecall",
            CallVariant::Callcode => "callcode",
            CallVariant::Create => "create",
            CallVariant::Create2 => "create2",
            CallVariant::Selfdestruct => "selfdestruct",
        }
    }
}

/// Outcome of a call, encoded as `0` (reverted) or `1` (succeeded) on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CallStatus {
    Reverted,
    #[default]
    Succeeded,
}

impl From<CallStatus> for u8 {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Reverted => 0,
            CallStatus::Succeeded => 1,
        }
    }
}

impl TryFrom<u8> for CallStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CallStatus::Reverted),
            1 => Ok(CallStatus::Succeeded),
            other => Err(format!("invalid call status {}", other)),
        }
    }
}

/// One node of the call tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntryCall {
    pub path: String,
    pub variant: CallVariant,
    pub gas: u64,
    pub is_precompile: bool,
    pub from: String,
    pub to: String,
    pub input: String,
    pub output: String,
    pub gas_used: u64,
    pub value: String,
    pub status: CallStatus,
    pub codehash: String,
    pub children: Vec<TraceEntry>,
}

/// A log emitted by the enclosing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntryLog {
    pub path: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// A storage read performed by the enclosing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntrySload {
    pub path: String,
    pub slot: String,
    pub value: String,
}

/// A storage write performed by the enclosing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntrySstore {
    pub path: String,
    pub slot: String,
    pub old_value: String,
    pub new_value: String,
}

/// Any entry that may appear among a call's children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceEntry {
    Call(TraceEntryCall),
    Log(TraceEntryLog),
    Sload(TraceEntrySload),
    Sstore(TraceEntrySstore),
}

impl TraceEntry {
    pub fn path(&self) -> &str {
        match self {
            TraceEntry::Call(call) => &call.path,
            TraceEntry::Log(log) => &log.path,
            TraceEntry::Sload(sload) => &sload.path,
            TraceEntry::Sstore(sstore) => &sstore.path,
        }
    }

    /// The wire `type` tag of this entry
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEntry::Call(_) => "call",
            TraceEntry::Log(_) => "log",
            TraceEntry::Sload(_) => "sload",
            TraceEntry::Sstore(_) => "sstore",
        }
    }

    pub fn as_call(&self) -> Option<&TraceEntryCall> {
        match self {
            TraceEntry::Call(call) => Some(call),
            _ => None,
        }
    }
}

impl TraceEntryCall {
    /// Iterate over this call and every nested call in depth-first order
    pub fn calls(&self) -> CallIter<'_> {
        CallIter { stack: vec![self] }
    }

    /// Iterate over the direct child calls, skipping logs and storage entries
    pub fn child_calls(&self) -> impl DoubleEndedIterator<Item = &TraceEntryCall> {
        self.children.iter().filter_map(TraceEntry::as_call)
    }
}

/// Depth-first iterator over a call subtree, see [`TraceEntryCall::calls`]
pub struct CallIter<'a> {
    stack: Vec<&'a TraceEntryCall>,
}

impl<'a> Iterator for CallIter<'a> {
    type Item = &'a TraceEntryCall;

    fn next(&mut self) -> Option<Self::Item> {
        let call = self.stack.pop()?;
        self.stack.extend(call.child_calls().rev());
        Some(call)
    }
}

/// Decoded metadata for the code at one address
///
/// `functions`, `events` and `errors` are keyed by selector or topic hash and
/// hold ABI fragment descriptors as plain JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub label: String,
    #[serde(default)]
    pub functions: BTreeMap<String, Value>,
    #[serde(default)]
    pub events: BTreeMap<String, Value>,
    #[serde(default)]
    pub errors: BTreeMap<String, Value>,
    #[serde(default)]
    pub fragments: Vec<Value>,
}

impl AddressInfo {
    /// Metadata-free entry carrying only a label
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// A fully assembled trace for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResponse {
    pub chain: String,
    pub txhash: String,
    /// keccak hash -> revealed preimage bytes, both hex encoded
    pub preimages: BTreeMap<String, String>,
    /// lowercase address -> codehash -> metadata
    pub addresses: BTreeMap<String, BTreeMap<String, AddressInfo>>,
    #[serde(with = "tagged_call")]
    pub entrypoint: TraceEntryCall,
}

/// Serialize the entrypoint with its `"type": "call"` tag like any other entry
mod tagged_call {
    use super::{TraceEntry, TraceEntryCall};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct Tagged<'a> {
        #[serde(rename = "type")]
        tag: &'static str,
        #[serde(flatten)]
        call: &'a TraceEntryCall,
    }

    pub fn serialize<S: Serializer>(call: &TraceEntryCall, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged { tag: "call", call }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TraceEntryCall, D::Error> {
        match TraceEntry::deserialize(deserializer)? {
            TraceEntry::Call(call) => Ok(call),
            other => Err(D::Error::custom(format!(
                "entrypoint must be a call entry, found {}",
                other.kind()
            ))),
        }
    }
}

/// Check that a transaction hash is `0x` followed by 64 hex digits
pub fn is_valid_tx_hash(txhash: &str) -> bool {
    txhash
        .strip_prefix("0x")
        .is_some_and(|digits| digits.len() == 64 && digits.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(path: &str) -> TraceEntryCall {
        TraceEntryCall {
            path: path.to_string(),
            value: "0x0".to_string(),
            codehash: UNKNOWN_CODEHASH.to_string(),
            ..TraceEntryCall::default()
        }
    }

    #[test]
    fn test_call_variant_from_raw() {
        assert_eq!(CallVariant::from_raw("CALL"), Some(CallVariant::Call));
        assert_eq!(CallVariant::from_raw("DelegateCall"), Some(CallVariant::Delegatecall));
        assert_eq!(CallVariant::from_raw("CREATE2"), Some(CallVariant::Create2));
        assert_eq!(CallVariant::from_raw("JUMP"), None);
        assert_eq!(CallVariant::Staticcall.as_str(), "staticcall");
    }

    #[test]
    fn test_call_entry_wire_shape() {
        let mut root = leaf(ROOT_PATH);
        root.status = CallStatus::Reverted;
        root.gas_used = 21000;
        root.children.push(TraceEntry::Log(TraceEntryLog {
            path: "0.0".to_string(),
            topics: vec!["0xddf2".to_string()],
            data: "0x".to_string(),
        }));

        let json = serde_json::to_value(TraceEntry::Call(root)).unwrap();
        assert_eq!(json["type"], "call");
        assert_eq!(json["variant"], "call");
        assert_eq!(json["status"], 0);
        assert_eq!(json["gasUsed"], 21000);
        assert_eq!(json["isPrecompile"], false);
        assert_eq!(json["children"][0]["type"], "log");
        assert_eq!(json["children"][0]["path"], "0.0");
    }

    #[test]
    fn test_sstore_wire_shape() {
        let entry = TraceEntry::Sstore(TraceEntrySstore {
            path: "0.2".to_string(),
            slot: "0x01".to_string(),
            old_value: "0x00".to_string(),
            new_value: "0x05".to_string(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "sstore");
        assert_eq!(json["oldValue"], "0x00");
        assert_eq!(json["newValue"], "0x05");
    }

    #[test]
    fn test_trace_response_entrypoint_is_tagged() {
        let response = TraceResponse {
            chain: "ethereum".to_string(),
            txhash: format!("0x{}", "ab".repeat(32)),
            preimages: BTreeMap::new(),
            addresses: BTreeMap::new(),
            entrypoint: leaf(ROOT_PATH),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["entrypoint"]["type"], "call");
        assert_eq!(json["entrypoint"]["path"], "0");

        let parsed: TraceResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_entrypoint_rejects_non_call() {
        let json = json!({
            "chain": "ethereum",
            "txhash": "0x00",
            "preimages": {},
            "addresses": {},
            "entrypoint": { "type": "log", "path": "0", "topics": [], "data": "0x" }
        });
        let result = serde_json::from_value::<TraceResponse>(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("entrypoint must be a call"));
    }

    #[test]
    fn test_calls_iterates_depth_first() {
        let mut first = leaf("0.0");
        first.children.push(TraceEntry::Call(leaf("0.0.0")));
        let mut root = leaf(ROOT_PATH);
        root.children.push(TraceEntry::Call(first));
        root.children.push(TraceEntry::Log(TraceEntryLog {
            path: "0.1".to_string(),
            ..TraceEntryLog::default()
        }));
        root.children.push(TraceEntry::Call(leaf("0.2")));

        let paths: Vec<&str> = root.calls().map(|call| call.path.as_str()).collect();
        assert_eq!(paths, vec!["0", "0.0", "0.0.0", "0.2"]);
        assert_eq!(root.child_calls().count(), 2);
    }

    #[test]
    fn test_address_info_placeholder() {
        let info = AddressInfo::placeholder("Contract");
        assert_eq!(info.label, "Contract");
        assert!(info.functions.is_empty());
        assert!(info.fragments.is_empty());

        let parsed: AddressInfo = serde_json::from_value(json!({ "label": "Token" })).unwrap();
        assert_eq!(parsed.label, "Token");
        assert!(parsed.events.is_empty());
    }

    #[test]
    fn test_is_valid_tx_hash() {
        assert!(is_valid_tx_hash(&format!("0x{}", "a".repeat(64))));
        assert!(!is_valid_tx_hash(&"a".repeat(64)));
        assert!(!is_valid_tx_hash(&format!("0x{}", "a".repeat(63))));
        assert!(!is_valid_tx_hash(&format!("0x{}", "g".repeat(64))));
    }
}
