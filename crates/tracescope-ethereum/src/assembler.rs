//! Assembly of a [`TraceResponse`] from raw tracer output
//!
//! The assembler normalizes the root call, then attaches metadata for every
//! address the tree references. Addresses the [`ContractRegistry`] does not
//! know get a placeholder entry under the unknown codehash, so every address
//! in the tree is present in the response.

use crate::address::AddressRegistry;
use crate::normalizer::CallTreeNormalizer;
use serde_json::Value;
use std::collections::BTreeMap;
use tracescope_core::{
    AddressInfo, ContractRegistry, Diagnostic, NoContractRegistry, TraceError, TraceResponse,
    TraceSource, ROOT_PATH, UNKNOWN_CODEHASH,
};
use tracing::debug;

/// Label given to addresses with no registry metadata
pub const DEFAULT_CONTRACT_LABEL: &str = "Contract";

/// An assembled response plus the non-fatal problems met on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTrace {
    pub response: TraceResponse,
    pub diagnostics: Vec<Diagnostic>,
}

impl AssembledTrace {
    /// Whether every field decoded cleanly
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Builds [`TraceResponse`] values from raw call tracer output
#[derive(Debug, Clone)]
pub struct TraceAssembler<R = NoContractRegistry> {
    registry: R,
    normalizer: CallTreeNormalizer,
    default_label: String,
}

impl TraceAssembler<NoContractRegistry> {
    pub fn new() -> Self {
        Self {
            registry: NoContractRegistry,
            normalizer: CallTreeNormalizer::new(),
            default_label: DEFAULT_CONTRACT_LABEL.to_string(),
        }
    }
}

impl Default for TraceAssembler<NoContractRegistry> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ContractRegistry> TraceAssembler<R> {
    /// Use `registry` for address metadata
    pub fn with_registry<S: ContractRegistry>(self, registry: S) -> TraceAssembler<S> {
        TraceAssembler {
            registry,
            normalizer: self.normalizer,
            default_label: self.default_label,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.normalizer = self.normalizer.with_max_depth(max_depth);
        self
    }

    /// Label placeholder entries with `label` instead of [`DEFAULT_CONTRACT_LABEL`]
    pub fn with_default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = label.into();
        self
    }

    /// Build a response with no preimages
    ///
    /// # Arguments
    ///
    /// * `chain` - Chain identifier echoed into the response
    /// * `txhash` - Transaction hash echoed into the response
    /// * `raw_root` - The tracer's root call object
    ///
    /// # Returns
    ///
    /// * `Ok(AssembledTrace)` - Response plus diagnostics for degraded fields
    /// * `Err(TraceError::MalformedTrace)` - `raw_root` is not an object
    /// * `Err(TraceError::TraceTooDeep)` - The depth limit was exceeded
    pub fn assemble(
        &self,
        chain: &str,
        txhash: &str,
        raw_root: &Value,
    ) -> Result<AssembledTrace, TraceError> {
        self.assemble_with_preimages(chain, txhash, raw_root, BTreeMap::new())
    }

    /// Build a response carrying a known keccak preimage table
    pub fn assemble_with_preimages(
        &self,
        chain: &str,
        txhash: &str,
        raw_root: &Value,
        preimages: BTreeMap<String, String>,
    ) -> Result<AssembledTrace, TraceError> {
        let root = raw_root.as_object().ok_or_else(|| {
            TraceError::MalformedTrace(format!(
                "expected root call object, found {}",
                json_kind(raw_root)
            ))
        })?;

        let mut addresses = AddressRegistry::new();
        let normalized = self.normalizer.normalize(root, ROOT_PATH, &mut addresses)?;
        debug!(
            "Normalized trace {} with {} addresses",
            txhash,
            addresses.len()
        );

        let address_infos = addresses
            .iter()
            .map(|address| {
                let info = self
                    .registry
                    .lookup(address, UNKNOWN_CODEHASH)
                    .unwrap_or_else(|| AddressInfo::placeholder(self.default_label.clone()));
                let mut by_codehash = BTreeMap::new();
                by_codehash.insert(UNKNOWN_CODEHASH.to_string(), info);
                (address.to_string(), by_codehash)
            })
            .collect();

        if !normalized.diagnostics.is_empty() {
            debug!(
                "Trace {} normalized with {} diagnostics",
                txhash,
                normalized.diagnostics.len()
            );
        }

        Ok(AssembledTrace {
            response: TraceResponse {
                chain: chain.to_string(),
                txhash: txhash.to_string(),
                preimages,
                addresses: address_infos,
                entrypoint: normalized.entry,
            },
            diagnostics: normalized.diagnostics,
        })
    }

    /// Fetch a trace from `source` and assemble it
    pub fn fetch_and_assemble<S: TraceSource + ?Sized>(
        &self,
        source: &S,
        chain: &str,
        txhash: &str,
    ) -> Result<AssembledTrace, TraceError> {
        let raw = source.fetch_call_trace(chain, txhash)?;
        self.assemble(chain, txhash, &raw)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct KnownToken;

    impl ContractRegistry for KnownToken {
        fn lookup(&self, address: &str, _codehash: &str) -> Option<AddressInfo> {
            (address == "0xb").then(|| AddressInfo::placeholder("Token"))
        }
    }

    struct FixedSource(Value);

    impl TraceSource for FixedSource {
        fn fetch_call_trace(&self, _chain: &str, txhash: &str) -> Result<Value, TraceError> {
            if txhash == "missing" {
                return Err(TraceError::NotFound(txhash.to_string()));
            }
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_two_node_trace() {
        let raw = json!({
            "from": "0xA", "to": "0xB", "gas": "0x10", "gasUsed": "0x5",
            "input": "0x", "output": "0x",
            "calls": [ { "from": "0xB", "to": "0xC", "gas": "0x1", "gasUsed": "0x1" } ]
        });
        let assembled = TraceAssembler::new().assemble("ethereum", "0xabc", &raw).unwrap();
        let response = assembled.response;

        assert_eq!(response.entrypoint.path, "0");
        assert_eq!(response.entrypoint.gas, 16);
        assert_eq!(response.entrypoint.gas_used, 5);
        assert_eq!(response.entrypoint.children.len(), 1);
        assert_eq!(response.entrypoint.children[0].path(), "0.0");

        let keys: Vec<&str> = response.addresses.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["0xa", "0xb", "0xc"]);
        for infos in response.addresses.values() {
            assert_eq!(infos[UNKNOWN_CODEHASH].label, DEFAULT_CONTRACT_LABEL);
        }
        assert!(assembled.diagnostics.is_empty());
    }

    #[test]
    fn test_non_object_root_is_malformed() {
        let result = TraceAssembler::new().assemble("ethereum", "0xabc", &Value::Null);
        match result {
            Err(TraceError::MalformedTrace(message)) => assert!(message.contains("null")),
            _ => panic!("Expected malformed trace error"),
        }
    }

    #[test]
    fn test_registry_metadata_and_label() {
        let raw = json!({ "from": "0xa", "to": "0xb" });
        let response = TraceAssembler::new()
            .with_registry(KnownToken)
            .with_default_label("Unknown")
            .assemble("ethereum", "0xabc", &raw)
            .unwrap()
            .response;

        assert_eq!(response.addresses["0xa"][UNKNOWN_CODEHASH].label, "Unknown");
        assert_eq!(response.addresses["0xb"][UNKNOWN_CODEHASH].label, "Token");
    }

    #[test]
    fn test_preimages_are_carried() {
        let mut preimages = BTreeMap::new();
        preimages.insert("0x01".to_string(), "0x02".to_string());
        let response = TraceAssembler::new()
            .assemble_with_preimages("ethereum", "0xabc", &json!({}), preimages.clone())
            .unwrap()
            .response;
        assert_eq!(response.preimages, preimages);
        assert!(response.addresses.is_empty());
    }

    #[test]
    fn test_fetch_and_assemble() {
        let source = FixedSource(json!({ "from": "0xa", "to": "0xb" }));
        let assembler = TraceAssembler::new();

        let assembled = assembler.fetch_and_assemble(&source, "ethereum", "0x01").unwrap();
        assert_eq!(assembled.response.txhash, "0x01");
        assert!(assembled.is_complete());

        let missing = assembler.fetch_and_assemble(&source, "ethereum", "missing");
        assert!(matches!(missing, Err(TraceError::NotFound(_))));
    }
}
