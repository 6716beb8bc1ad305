//! Trait definitions for tracescope-core
//!
//! This module contains the collaborator interfaces the trace pipeline depends
//! on: fetching raw traces from a node, looking up contract metadata, and
//! compiling contract sources.

use crate::{AddressInfo, TraceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for fetching raw call traces from a node
///
/// Implementations return the tracer output untouched; decoding and
/// normalization happen in the trace assembler.
///
/// # Examples
///
/// ```rust,ignore
/// use tracescope_core::TraceSource;
///
/// struct FixtureSource(serde_json::Value);
///
/// impl TraceSource for FixtureSource {
///     fn fetch_call_trace(&self, _chain: &str, _txhash: &str) -> Result<serde_json::Value, TraceError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait TraceSource {
    /// Fetch the call tracer output for a transaction
    ///
    /// # Arguments
    ///
    /// * `chain` - Chain name the transaction was executed on
    /// * `txhash` - Transaction hash, `0x` followed by 64 hex digits
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - Raw root call object
    /// * `Err(TraceError::NotFound)` - Unknown transaction or chain
    /// * `Err(TraceError::Transport)` - Node unreachable or answered garbage
    fn fetch_call_trace(&self, chain: &str, txhash: &str) -> Result<Value, TraceError>;
}

/// Trait for looking up decoded metadata of deployed code
///
/// A single address may carry several codehash-scoped entries, for example
/// across proxy upgrades.
pub trait ContractRegistry {
    /// Metadata for `address` running code with `codehash`
    ///
    /// `address` is lowercase hex. `codehash` may be
    /// [`crate::UNKNOWN_CODEHASH`] when the executing code was not observed.
    fn lookup(&self, address: &str, codehash: &str) -> Option<AddressInfo>;
}

/// Registry that knows no contracts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContractRegistry;

impl ContractRegistry for NoContractRegistry {
    fn lookup(&self, _address: &str, _codehash: &str) -> Option<AddressInfo> {
        None
    }
}

impl<R: ContractRegistry + ?Sized> ContractRegistry for &R {
    fn lookup(&self, address: &str, codehash: &str) -> Option<AddressInfo> {
        (**self).lookup(address, codehash)
    }
}

/// Source language accepted by a [`SourceCompiler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Solidity,
    Vyper,
}

/// Artifacts produced by a [`SourceCompiler`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub abi: Value,
    pub bytecode: String,
    pub deployed_bytecode: String,
}

/// Trait for compiling contract sources into ABI and bytecode
pub trait SourceCompiler {
    /// Compile `source` with compiler `version`
    ///
    /// Compiler diagnostics are reported as [`TraceError::Compile`].
    fn compile(
        &self,
        source: &str,
        version: &str,
        language: SourceLanguage,
    ) -> Result<CompileOutput, TraceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoCompiler;

    impl SourceCompiler for EchoCompiler {
        fn compile(
            &self,
            source: &str,
            version: &str,
            language: SourceLanguage,
        ) -> Result<CompileOutput, TraceError> {
            if source.trim().is_empty() {
                return Err(TraceError::Compile("empty source".to_string()));
            }
            Ok(CompileOutput {
                abi: json!([{ "type": "function", "name": "noop" }]),
                bytecode: format!("0x{}", version.replace('.', "")),
                deployed_bytecode: match language {
                    SourceLanguage::Solidity => "0x60".to_string(),
                    SourceLanguage::Vyper => "0x61".to_string(),
                },
            })
        }
    }

    struct SingleContract;

    impl ContractRegistry for SingleContract {
        fn lookup(&self, address: &str, _codehash: &str) -> Option<AddressInfo> {
            (address == "0xaa").then(|| AddressInfo::placeholder("Token"))
        }
    }

    #[test]
    fn test_source_compiler_contract() {
        let output = EchoCompiler
            .compile("contract A {}", "0.8.20", SourceLanguage::Vyper)
            .unwrap();
        assert_eq!(output.bytecode, "0x0820");
        assert_eq!(output.deployed_bytecode, "0x61");

        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("deployedBytecode").is_some());

        let result = EchoCompiler.compile("  ", "0.8.20", SourceLanguage::Solidity);
        assert!(matches!(result, Err(TraceError::Compile(_))));
    }

    #[test]
    fn test_registry_through_reference() {
        let registry = SingleContract;
        let by_ref: &dyn ContractRegistry = &registry;
        assert_eq!(by_ref.lookup("0xaa", "0x").map(|info| info.label), Some("Token".to_string()));
        assert!((&registry).lookup("0xbb", "0x").is_none());
        assert!(NoContractRegistry.lookup("0xaa", "0x").is_none());
    }
}
