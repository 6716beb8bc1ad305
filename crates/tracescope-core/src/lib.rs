//! Core types and traits for normalized EVM call traces
//!
//! This crate defines the wire model shared by the trace normalizer, the
//! storage slot classifier and the command-line front end.
//!
//! # Contents
//!
//! - **Trace model**: [`TraceEntry`], [`TraceEntryCall`] and [`TraceResponse`],
//!   serialized with camelCase fields and a lowercase `type` discriminator
//! - **Storage model**: [`SlotInfo`] and [`StorageResponse`], the classification
//!   of touched storage slots against a contract's declared variables
//! - **Layout input**: [`ContractLayout`] and [`TypeDescriptor`], the declared
//!   variable list a slot classification starts from
//! - **Collaborators**: [`TraceSource`], [`ContractRegistry`] and
//!   [`SourceCompiler`], the seams to node access and contract metadata
//!
//! Hashing, slot arithmetic and node transport live in
//! `tracescope-ethereum`.

pub mod diagnostic;
pub mod error;
pub mod layout;
pub mod storage;
pub mod trace;
pub mod traits;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{SlotResolutionError, TraceError};
pub use layout::{
    elementary_storage, ContractLayout, DeclaredVariable, ElementaryStorage, StructDefinition,
    TypeDescriptor,
};
pub use storage::{
    ArrayCatalogEntry, ArraySlotInfo, DynamicSlotInfo, MappingSlotInfo, MemberCatalogEntry,
    RawSlotInfo, SlotInfo, SlotVariables, StorageResponse, StructCatalogEntry, StructSlotInfo,
    TypeDescriptions, TypeName, VariableInfo,
};
pub use trace::{
    is_valid_tx_hash, AddressInfo, CallStatus, CallVariant, TraceEntry, TraceEntryCall,
    TraceEntryLog, TraceEntrySload, TraceEntrySstore, TraceResponse, ROOT_PATH,
    UNKNOWN_CODEHASH,
};
pub use traits::{
    CompileOutput, ContractRegistry, NoContractRegistry, SourceCompiler, SourceLanguage,
    TraceSource,
};
