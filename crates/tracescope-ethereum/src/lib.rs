//! Ethereum-specific trace normalization and storage classification
//!
//! This crate turns `callTracer` output into the normalized trace model of
//! `tracescope-core`, and classifies touched storage slots against Solidity
//! storage layout rules using keccak preimages to recover mapping keys.

pub mod address;
pub mod assembler;
pub mod normalizer;
pub mod registry;
pub mod resolver;
pub mod rpc;
pub mod slot;
pub mod walker;

pub use address::{is_precompile, normalize_address, AddressRegistry};
pub use assembler::{AssembledTrace, TraceAssembler, DEFAULT_CONTRACT_LABEL};
pub use normalizer::{parse_hex_quantity, parse_trace_json, CallTreeNormalizer, NormalizedCall};
pub use registry::StaticContractRegistry;
pub use resolver::{
    build_storage_response, decode_mapping_key, resolve_slot, PreimageTable, StorageResolution,
    StorageSlotResolver,
};
pub use rpc::JsonRpcTraceSource;
pub use slot::{data_slot, encode_mapping_key, format_slot, keccak256, mapping_slot, parse_slot};
pub use walker::{footprint, Footprint, Placement, StorageLayoutWalker};

pub use alloy_primitives::U256;
