//! Classification of touched storage slots against a declared layout
//!
//! A touched slot is matched, in order, against:
//!
//! 1. the slots declared variables occupy directly (packed values, structs,
//!    static arrays, and the anchor slots of containers)
//! 2. the data regions of dynamic arrays and long `string`/`bytes` values,
//!    starting at `keccak256(anchor)`
//! 3. mapping values, recovered from the keccak preimage table: a preimage of
//!    `key ++ container` names both the mapping and the key
//!
//! Containers nested inside mapping values or array elements are found by
//! resolving their own anchor slot the same way, up to a fixed nesting depth.
//! Slots that look hashed but match nothing are reported as unresolved
//! mapping slots when the layout declares mappings, and as unresolved raw
//! slots otherwise.

use crate::slot::{data_slot, decode_hex_bytes, format_slot, keccak256, parse_slot};
use crate::walker::{find_struct, footprint, Footprint, Placement, StorageLayoutWalker, SLOT_BYTES};
use alloy_primitives::{I256, U256};
use std::collections::{BTreeMap, BTreeSet};
use tracescope_core::{
    elementary_storage, ArraySlotInfo, ContractLayout, Diagnostic, DiagnosticKind,
    DynamicSlotInfo, ElementaryStorage, MappingSlotInfo, RawSlotInfo, SlotInfo,
    SlotResolutionError, SlotVariables, StorageResponse, StructDefinition, StructSlotInfo,
    TypeDescriptor, VariableInfo,
};
use tracing::{debug, warn};

/// Largest slot distance from a data start still attributed to that data
pub const DATA_WINDOW: u64 = 1 << 32;

/// How many containers deep a nested anchor is searched for
pub const MAX_NESTING: usize = 8;

/// Cap on container anchors enumerated inside static structs and arrays
pub const MAX_STATIC_ANCHORS: usize = 4096;

/// Known keccak preimages, keyed by their hash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreimageTable {
    entries: BTreeMap<U256, Vec<u8>>,
}

impl PreimageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `preimage` and return its hash
    pub fn insert(&mut self, preimage: Vec<u8>) -> U256 {
        let hash = U256::from_be_bytes(keccak256(&preimage));
        self.entries.insert(hash, preimage);
        hash
    }

    /// Parse a `hash -> preimage` hex map
    ///
    /// Entries that are not hex, or whose preimage does not hash to the key,
    /// are dropped and reported.
    pub fn from_hex_map(map: &BTreeMap<String, String>) -> (Self, Vec<Diagnostic>) {
        let mut table = Self::new();
        let mut diagnostics = Vec::new();
        for (hash_hex, preimage_hex) in map {
            let parsed = parse_slot(hash_hex).zip(decode_hex_bytes(preimage_hex));
            match parsed {
                Some((hash, preimage)) if U256::from_be_bytes(keccak256(&preimage)) == hash => {
                    table.entries.insert(hash, preimage);
                }
                _ => diagnostics.push(Diagnostic::new(
                    hash_hex.clone(),
                    DiagnosticKind::InvalidPreimage {
                        hash: hash_hex.clone(),
                    },
                )),
            }
        }
        (table, diagnostics)
    }

    pub fn get(&self, hash: &U256) -> Option<&[u8]> {
        self.entries.get(hash).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&U256, &Vec<u8>)> {
        self.entries.iter()
    }
}

/// One variable found in a slot, before conversion to [`VariableInfo`]
#[derive(Debug, Clone)]
struct Leaf {
    offset_bits: u32,
    name: String,
    full_name: String,
    ty: TypeDescriptor,
    bits: u16,
}

impl Leaf {
    fn into_variable(self) -> (u32, VariableInfo) {
        (
            self.offset_bits,
            VariableInfo {
                name: self.name,
                full_name: self.full_name,
                type_name: self.ty.to_type_name(),
                bits: self.bits,
            },
        )
    }
}

fn into_variables(leaves: Vec<Leaf>) -> SlotVariables {
    leaves.into_iter().map(Leaf::into_variable).collect()
}

/// Slot of a mapping, dynamic array, `string` or `bytes` value
#[derive(Debug, Clone)]
struct Anchor {
    slot: U256,
    ty: TypeDescriptor,
    name: String,
    full_name: String,
}

/// A slot located through a hashed derivation
#[derive(Debug)]
enum Derived {
    ArrayData {
        data: U256,
        index: U256,
        leaves: Vec<Leaf>,
    },
    BytesData {
        anchor: U256,
        data: U256,
        byte_offset: U256,
        leaves: Vec<Leaf>,
    },
    MappingValue {
        container: U256,
        key: String,
        offset: U256,
        leaves: Vec<Leaf>,
    },
}

impl Derived {
    fn leaves(&self) -> &[Leaf] {
        match self {
            Derived::ArrayData { leaves, .. }
            | Derived::BytesData { leaves, .. }
            | Derived::MappingValue { leaves, .. } => leaves,
        }
    }

    fn into_slot_info(self) -> SlotInfo {
        match self {
            Derived::ArrayData {
                data,
                index,
                leaves,
            } => SlotInfo::Array(ArraySlotInfo {
                resolved: true,
                variables: into_variables(leaves),
                base_slot: format_slot(data),
                offset: saturating_u64(index),
            }),
            Derived::BytesData {
                anchor,
                data,
                byte_offset,
                leaves,
            } => SlotInfo::Dynamic(DynamicSlotInfo {
                resolved: true,
                variables: into_variables(leaves),
                base_slot: format_slot(anchor),
                key: format_slot(data),
                offset: saturating_u64(byte_offset),
            }),
            Derived::MappingValue {
                container,
                key,
                offset,
                leaves,
            } => SlotInfo::Mapping(MappingSlotInfo {
                resolved: true,
                variables: into_variables(leaves),
                base_slot: Some(format_slot(container)),
                mapping_key: Some(key),
                offset: saturating_u64(offset),
            }),
        }
    }
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_limbs()[0]
    }
}

/// Classifies touched slots of one contract
///
/// Construction places every declared variable and validates every type the
/// layout mentions, so a resolver only exists for a consistent layout.
#[derive(Debug)]
pub struct StorageSlotResolver<'a> {
    layout: &'a ContractLayout,
    placements: Vec<Placement<'a>>,
    anchors: Vec<Anchor>,
}

impl<'a> StorageSlotResolver<'a> {
    /// Place `layout` and collect the container anchors of its static region
    pub fn new(layout: &'a ContractLayout) -> Result<Self, SlotResolutionError> {
        let placements = StorageLayoutWalker::new(&layout.structs).place_all(&layout.variables)?;

        let mut validated = BTreeSet::new();
        for variable in &layout.variables {
            validate_type(&layout.structs, &variable.name, &variable.type_name, &mut validated)?;
        }

        let mut resolver = Self {
            layout,
            placements,
            anchors: Vec::new(),
        };
        let mut anchors = Vec::new();
        for placement in &resolver.placements {
            let variable = placement.variable;
            resolver.collect_anchors(
                &variable.type_name,
                &variable.name,
                &variable.name,
                placement.slot,
                &mut anchors,
            )?;
        }
        if anchors.len() >= MAX_STATIC_ANCHORS {
            warn!(
                "{}: container anchors capped at {}",
                layout.contract_name, MAX_STATIC_ANCHORS
            );
        }
        resolver.anchors = anchors;
        Ok(resolver)
    }

    pub fn layout(&self) -> &ContractLayout {
        self.layout
    }

    /// Placements of the declared variables, in declaration order
    pub fn placements(&self) -> &[Placement<'a>] {
        &self.placements
    }

    fn structs(&self) -> &'a [StructDefinition] {
        &self.layout.structs
    }

    /// Classify `touched` using `preimages` to recover mapping keys
    pub fn resolve(
        &self,
        touched: U256,
        preimages: &PreimageTable,
    ) -> Result<SlotInfo, SlotResolutionError> {
        if let Some(info) = self.resolve_direct(touched)? {
            return Ok(info);
        }
        if let Some(derived) = self.locate_derived(touched, preimages, 0)? {
            return Ok(derived.into_slot_info());
        }
        Ok(self.unresolved(touched))
    }

    /// Slots occupied by declared variables themselves
    fn resolve_direct(&self, touched: U256) -> Result<Option<SlotInfo>, SlotResolutionError> {
        let mut packed = Vec::new();
        for placement in self.placements.iter().filter(|p| p.contains(touched)) {
            let variable = placement.variable;
            match placement.footprint {
                Footprint::Packed { .. } => packed.push(Leaf {
                    offset_bits: placement.offset_bits,
                    name: variable.name.clone(),
                    full_name: variable.name.clone(),
                    ty: variable.type_name.clone(),
                    bits: placement.footprint.bits(),
                }),
                Footprint::Slots(_) => {
                    let rel = touched - placement.slot;
                    return match &variable.type_name {
                        TypeDescriptor::Array {
                            base,
                            length: Some(length),
                        } => {
                            let (index, leaves) = self.element_leaves(
                                base,
                                &variable.name,
                                &variable.name,
                                rel,
                                Some(U256::from(*length as u64)),
                            )?;
                            Ok(Some(SlotInfo::Array(ArraySlotInfo {
                                resolved: true,
                                variables: into_variables(leaves),
                                base_slot: format_slot(placement.slot),
                                offset: saturating_u64(index),
                            })))
                        }
                        ty => {
                            let leaves = self.leaves_at(ty, &variable.name, &variable.name, rel)?;
                            Ok(Some(SlotInfo::Struct(StructSlotInfo {
                                resolved: true,
                                variables: into_variables(leaves),
                                offset: saturating_u64(rel),
                            })))
                        }
                    };
                }
            }
        }

        if packed.is_empty() {
            return Ok(None);
        }
        Ok(Some(SlotInfo::Raw(RawSlotInfo {
            resolved: true,
            variables: into_variables(packed),
        })))
    }

    /// Slots reached through keccak derivations
    fn locate_derived(
        &self,
        touched: U256,
        preimages: &PreimageTable,
        depth: usize,
    ) -> Result<Option<Derived>, SlotResolutionError> {
        for anchor in &self.anchors {
            if let Some(derived) = self.within_data(anchor, touched)? {
                return Ok(Some(derived));
            }
        }

        for (hash, preimage) in preimages.iter() {
            let Some(diff) = touched.checked_sub(*hash) else {
                continue;
            };
            if diff >= U256::from(DATA_WINDOW) {
                continue;
            }

            if preimage.len() > 32 {
                let split = preimage.len() - 32;
                let container = U256::from_be_slice(&preimage[split..]);
                let Some(anchor) = self.anchor_at(container, preimages, depth)? else {
                    continue;
                };
                let TypeDescriptor::Mapping { key, value } = &anchor.ty else {
                    continue;
                };
                let value_span = footprint(self.structs(), &anchor.name, value)?.slot_count();
                if diff >= value_span {
                    continue;
                }

                let key_text = decode_mapping_key(key, &preimage[..split]);
                let name = format!("{}[{}]", anchor.name, key_text);
                let full_name = format!("{}[{}]", anchor.full_name, key_text);
                let leaves = self.leaves_at(value, &name, &full_name, diff)?;
                return Ok(Some(Derived::MappingValue {
                    container,
                    key: key_text,
                    offset: diff,
                    leaves,
                }));
            }

            if preimage.len() == 32 {
                let container = U256::from_be_slice(preimage);
                let Some(anchor) = self.anchor_at(container, preimages, depth)? else {
                    continue;
                };
                if let Some(derived) = self.within_data(&anchor, touched)? {
                    return Ok(Some(derived));
                }
            }
        }

        Ok(None)
    }

    /// The container whose anchor slot is exactly `slot`, if any
    fn anchor_at(
        &self,
        slot: U256,
        preimages: &PreimageTable,
        depth: usize,
    ) -> Result<Option<Anchor>, SlotResolutionError> {
        if let Some(anchor) = self.anchors.iter().find(|anchor| anchor.slot == slot) {
            return Ok(Some(anchor.clone()));
        }
        if depth >= MAX_NESTING {
            return Ok(None);
        }

        let Some(derived) = self.locate_derived(slot, preimages, depth + 1)? else {
            return Ok(None);
        };
        Ok(derived
            .leaves()
            .iter()
            .find(|leaf| leaf.offset_bits == 0 && leaf.ty.is_hashed_container())
            .map(|leaf| Anchor {
                slot,
                ty: leaf.ty.clone(),
                name: leaf.name.clone(),
                full_name: leaf.full_name.clone(),
            }))
    }

    /// Match `touched` against the data region of a dynamic array or long string
    fn within_data(
        &self,
        anchor: &Anchor,
        touched: U256,
    ) -> Result<Option<Derived>, SlotResolutionError> {
        let data = match &anchor.ty {
            TypeDescriptor::Mapping { .. } => return Ok(None),
            _ => data_slot(anchor.slot),
        };
        let Some(diff) = touched.checked_sub(data) else {
            return Ok(None);
        };
        if diff >= U256::from(DATA_WINDOW) {
            return Ok(None);
        }

        match &anchor.ty {
            TypeDescriptor::Array { base, length: None } => {
                let (index, leaves) =
                    self.element_leaves(base, &anchor.name, &anchor.full_name, diff, None)?;
                Ok(Some(Derived::ArrayData {
                    data,
                    index,
                    leaves,
                }))
            }
            TypeDescriptor::Elementary { .. } => Ok(Some(Derived::BytesData {
                anchor: anchor.slot,
                data,
                byte_offset: diff * U256::from(SLOT_BYTES),
                leaves: vec![Leaf {
                    offset_bits: 0,
                    name: anchor.name.clone(),
                    full_name: anchor.full_name.clone(),
                    ty: anchor.ty.clone(),
                    bits: 256,
                }],
            })),
            _ => Ok(None),
        }
    }

    /// Variables at slot `rel` of a value of type `ty`
    fn leaves_at(
        &self,
        ty: &TypeDescriptor,
        name: &str,
        full_name: &str,
        rel: U256,
    ) -> Result<Vec<Leaf>, SlotResolutionError> {
        let value_footprint = footprint(self.structs(), name, ty)?;
        if let Footprint::Packed { .. } = value_footprint {
            if !rel.is_zero() {
                return Ok(Vec::new());
            }
            return Ok(vec![Leaf {
                offset_bits: 0,
                name: name.to_string(),
                full_name: full_name.to_string(),
                ty: ty.clone(),
                bits: value_footprint.bits(),
            }]);
        }

        match ty {
            TypeDescriptor::Struct { name: struct_name } => {
                let definition = find_struct(self.structs(), struct_name)?;
                let mut walker = StorageLayoutWalker::new(self.structs());
                let mut leaves = Vec::new();
                for member in &definition.members {
                    let placement = walker.place(member)?;
                    if !placement.contains(rel) {
                        continue;
                    }
                    let member_path = format!("{}.{}", full_name, member.name);
                    match placement.footprint {
                        Footprint::Packed { .. } => leaves.push(Leaf {
                            offset_bits: placement.offset_bits,
                            name: member.name.clone(),
                            full_name: member_path,
                            ty: member.type_name.clone(),
                            bits: placement.footprint.bits(),
                        }),
                        Footprint::Slots(_) => leaves.extend(self.leaves_at(
                            &member.type_name,
                            &member.name,
                            &member_path,
                            rel - placement.slot,
                        )?),
                    }
                }
                Ok(leaves)
            }
            TypeDescriptor::Array {
                base,
                length: Some(length),
            } => {
                let (_, leaves) = self.element_leaves(
                    base,
                    name,
                    full_name,
                    rel,
                    Some(U256::from(*length as u64)),
                )?;
                Ok(leaves)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Elements of an array stored at slot `rel` from its first element
    ///
    /// Returns the index of the first element in that slot together with the
    /// variables found there. `length` bounds packed elements of static arrays.
    fn element_leaves(
        &self,
        base: &TypeDescriptor,
        name: &str,
        full_name: &str,
        rel: U256,
        length: Option<U256>,
    ) -> Result<(U256, Vec<Leaf>), SlotResolutionError> {
        match footprint(self.structs(), name, base)? {
            Footprint::Packed { bytes } => {
                let per_slot = SLOT_BYTES / bytes;
                let first = rel * U256::from(per_slot);
                let mut leaves = Vec::new();
                for position in 0..per_slot {
                    let index = first + U256::from(position);
                    if length.is_some_and(|length| index >= length) {
                        break;
                    }
                    leaves.push(Leaf {
                        offset_bits: position * bytes * 8,
                        name: format!("{}[{}]", name, index),
                        full_name: format!("{}[{}]", full_name, index),
                        ty: base.clone(),
                        bits: (bytes * 8) as u16,
                    });
                }
                Ok((first, leaves))
            }
            Footprint::Slots(element_slots) => {
                let index = rel / element_slots;
                let within = rel % element_slots;
                let leaves = self.leaves_at(
                    base,
                    &format!("{}[{}]", name, index),
                    &format!("{}[{}]", full_name, index),
                    within,
                )?;
                Ok((index, leaves))
            }
        }
    }

    /// Record container anchors inside a statically placed value
    fn collect_anchors(
        &self,
        ty: &TypeDescriptor,
        name: &str,
        full_name: &str,
        slot: U256,
        anchors: &mut Vec<Anchor>,
    ) -> Result<(), SlotResolutionError> {
        if anchors.len() >= MAX_STATIC_ANCHORS {
            return Ok(());
        }
        if ty.is_hashed_container() {
            anchors.push(Anchor {
                slot,
                ty: ty.clone(),
                name: name.to_string(),
                full_name: full_name.to_string(),
            });
            return Ok(());
        }
        if !holds_container(self.structs(), ty, &mut Vec::new()) {
            return Ok(());
        }

        match ty {
            TypeDescriptor::Struct { name: struct_name } => {
                let definition = find_struct(self.structs(), struct_name)?;
                let mut walker = StorageLayoutWalker::new(self.structs());
                for member in &definition.members {
                    let placement = walker.place(member)?;
                    self.collect_anchors(
                        &member.type_name,
                        &member.name,
                        &format!("{}.{}", full_name, member.name),
                        slot + placement.slot,
                        anchors,
                    )?;
                }
            }
            TypeDescriptor::Array {
                base,
                length: Some(length),
            } => {
                let element_footprint = footprint(self.structs(), name, base)?;
                let count = usize::try_from(*length).unwrap_or(usize::MAX);
                for index in 0..count {
                    if anchors.len() >= MAX_STATIC_ANCHORS {
                        break;
                    }
                    let index_word = U256::from(index);
                    let element_slot = match element_footprint {
                        Footprint::Packed { bytes } => index_word / U256::from(SLOT_BYTES / bytes),
                        Footprint::Slots(element_slots) => index_word * element_slots,
                    };
                    self.collect_anchors(
                        base,
                        &format!("{}[{}]", name, index),
                        &format!("{}[{}]", full_name, index),
                        slot + element_slot,
                        anchors,
                    )?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Fallback for slots nothing accounts for
    fn unresolved(&self, touched: U256) -> SlotInfo {
        if touched > U256::from(u64::MAX) {
            let mappings: Vec<&Anchor> = self
                .anchors
                .iter()
                .filter(|anchor| matches!(anchor.ty, TypeDescriptor::Mapping { .. }))
                .collect();
            if !mappings.is_empty() {
                return SlotInfo::Mapping(MappingSlotInfo {
                    resolved: false,
                    variables: SlotVariables::new(),
                    base_slot: match mappings.as_slice() {
                        [only] => Some(format_slot(only.slot)),
                        _ => None,
                    },
                    mapping_key: None,
                    offset: 0,
                });
            }
        }
        SlotInfo::unresolved()
    }
}

/// Whether a static value of type `ty` contains a container anywhere inside
fn holds_container<'s>(
    structs: &'s [StructDefinition],
    ty: &TypeDescriptor,
    visiting: &mut Vec<&'s str>,
) -> bool {
    if ty.is_hashed_container() {
        return true;
    }
    match ty {
        TypeDescriptor::Array { base, .. } => holds_container(structs, base, visiting),
        TypeDescriptor::Struct { name } => {
            let Ok(definition) = find_struct(structs, name) else {
                return false;
            };
            if visiting.contains(&definition.name.as_str()) {
                return false;
            }
            visiting.push(&definition.name);
            let found = definition
                .members
                .iter()
                .any(|member| holds_container(structs, &member.type_name, visiting));
            visiting.pop();
            found
        }
        _ => false,
    }
}

/// Check every type reachable from `ty`, including mapping values and array bases
fn validate_type<'s>(
    structs: &'s [StructDefinition],
    name: &str,
    ty: &'s TypeDescriptor,
    validated: &mut BTreeSet<&'s str>,
) -> Result<(), SlotResolutionError> {
    footprint(structs, name, ty)?;
    match ty {
        TypeDescriptor::Elementary { .. } => Ok(()),
        TypeDescriptor::Mapping { key, value } => {
            footprint(structs, name, key)?;
            validate_type(structs, name, value, validated)
        }
        TypeDescriptor::Array { base, .. } => validate_type(structs, name, base, validated),
        TypeDescriptor::Struct { name: struct_name } => {
            let definition = find_struct(structs, struct_name)?;
            if !validated.insert(&definition.name) {
                return Ok(());
            }
            for member in &definition.members {
                validate_type(structs, &member.name, &member.type_name, validated)?;
            }
            Ok(())
        }
    }
}

/// Render a mapping key according to the mapping's declared key type
///
/// Word-sized keys decode as their type (`0x`-prefixed 20-byte addresses,
/// decimal integers, `true`/`false`, left-aligned `bytesN`); `string` keys
/// decode as UTF-8 when valid. Anything else is rendered as `0x` hex.
pub fn decode_mapping_key(key_type: &TypeDescriptor, key: &[u8]) -> String {
    let type_name = match key_type {
        TypeDescriptor::Elementary { name } => name.trim(),
        _ => "",
    };

    if key.len() == 32 {
        let word = U256::from_be_slice(key);
        if type_name == "address"
            || type_name == "address payable"
            || type_name.starts_with("contract ")
            || type_name.starts_with("interface ")
        {
            return format!("0x{}", hex::encode(&key[12..]));
        }
        if type_name == "bool" {
            return (!word.is_zero()).to_string();
        }
        if type_name.starts_with("uint") || type_name.starts_with("enum ") {
            return word.to_string();
        }
        if type_name.starts_with("int") {
            return I256::from_raw(word).to_string();
        }
        if type_name.starts_with("bytes") {
            if let Some(ElementaryStorage::Value { bytes }) = elementary_storage(type_name) {
                return format!("0x{}", hex::encode(&key[..usize::from(bytes)]));
            }
        }
    }

    if type_name == "string" {
        if let Ok(text) = std::str::from_utf8(key) {
            return text.to_string();
        }
    }
    format!("0x{}", hex::encode(key))
}

/// Classify one touched slot, failing on an inconsistent layout
pub fn resolve_slot(
    touched: U256,
    layout: &ContractLayout,
    preimages: &PreimageTable,
) -> Result<SlotInfo, SlotResolutionError> {
    StorageSlotResolver::new(layout)?.resolve(touched, preimages)
}

/// A storage response plus the inputs that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageResolution {
    pub response: StorageResponse,
    pub diagnostics: Vec<Diagnostic>,
}

/// Classify every touched slot of a contract
///
/// Never fails: an inconsistent layout leaves every slot unresolved, and bad
/// slot strings or preimages are skipped. Each of these is reported as a
/// diagnostic.
///
/// # Arguments
///
/// * `layout` - Declared variables of the contract
/// * `touched_slots` - Slots read or written, as hex (or decimal) strings
/// * `preimages` - Known keccak preimages, `hash -> preimage` in hex
pub fn build_storage_response(
    layout: &ContractLayout,
    touched_slots: &[String],
    preimages: &BTreeMap<String, String>,
) -> StorageResolution {
    let (table, mut diagnostics) = PreimageTable::from_hex_map(preimages);

    let resolver = match StorageSlotResolver::new(layout) {
        Ok(resolver) => Some(resolver),
        Err(err) => {
            diagnostics.push(Diagnostic::new(
                layout.contract_name.clone(),
                DiagnosticKind::UnresolvedLayout {
                    reason: err.to_string(),
                },
            ));
            None
        }
    };

    let mut slots = BTreeMap::new();
    for raw in touched_slots {
        let Some(touched) = parse_slot(raw) else {
            diagnostics.push(Diagnostic::new(
                raw.clone(),
                DiagnosticKind::InvalidSlot { raw: raw.clone() },
            ));
            continue;
        };
        let key = format_slot(touched);

        let info = match &resolver {
            Some(resolver) => resolver.resolve(touched, &table).unwrap_or_else(|err| {
                diagnostics.push(Diagnostic::new(
                    key.clone(),
                    DiagnosticKind::UnresolvedLayout {
                        reason: err.to_string(),
                    },
                ));
                SlotInfo::unresolved()
            }),
            None => SlotInfo::unresolved(),
        };
        debug!("Slot {} classified as {}", key, info.kind());
        slots.insert(key, info);
    }

    StorageResolution {
        response: StorageResponse {
            all_structs: layout.all_struct_catalog(),
            arrays: layout.array_catalog(),
            structs: layout.used_struct_catalog(),
            slots,
        },
        diagnostics,
    }
}
