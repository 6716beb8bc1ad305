//! In-memory contract metadata registry
//!
//! Loaded from a JSON document of the same shape as a trace response's
//! `addresses` field:
//!
//! ```json
//! { "0xdac17f958d2ee523a2206206994597c13d831ec7": {
//!     "0x": { "label": "TetherToken", "functions": {}, "events": {}, "errors": {}, "fragments": [] } } }
//! ```

use crate::address::normalize_address;
use std::collections::BTreeMap;
use std::path::Path;
use tracescope_core::{AddressInfo, ContractRegistry, TraceError, UNKNOWN_CODEHASH};

/// Contract metadata held in memory, keyed by address and codehash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticContractRegistry {
    entries: BTreeMap<String, BTreeMap<String, AddressInfo>>,
}

impl StaticContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, TraceError> {
        let raw: BTreeMap<String, BTreeMap<String, AddressInfo>> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (address, by_codehash) in raw {
            for (codehash, info) in by_codehash {
                registry.insert(&address, &codehash, info);
            }
        }
        Ok(registry)
    }

    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Register metadata for `address` running `codehash`
    pub fn insert(&mut self, address: &str, codehash: &str, info: AddressInfo) {
        self.entries
            .entry(normalize_address(address))
            .or_default()
            .insert(codehash.to_ascii_lowercase(), info);
    }

    /// Number of addresses with at least one entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContractRegistry for StaticContractRegistry {
    /// Exact codehash match first; an unknown codehash falls back to the
    /// address's first entry in codehash order.
    fn lookup(&self, address: &str, codehash: &str) -> Option<AddressInfo> {
        let by_codehash = self.entries.get(&normalize_address(address))?;
        let codehash = codehash.to_ascii_lowercase();
        if let Some(info) = by_codehash.get(&codehash) {
            return Some(info.clone());
        }
        if codehash == UNKNOWN_CODEHASH {
            return by_codehash.values().next().cloned();
        }
        None
    }
}
