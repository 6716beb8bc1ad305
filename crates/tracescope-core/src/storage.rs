//! Storage slot classification model
//!
//! A [`StorageResponse`] maps each touched slot (as `0x` + 64 hex digits) to a
//! [`SlotInfo`] describing which declared variables live there. The variables
//! of a slot are keyed by their bit offset inside the 256-bit word.
//!
//! These types are output only. Integer-keyed maps inside internally tagged
//! enums cannot be read back through serde, so only `Serialize` is derived.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compiler-style type identifier pair, e.g. `t_uint256` / `uint256`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptions {
    pub type_identifier: String,
    pub type_string: String,
}

/// Type tree in the shape of a Solidity AST `TypeName` node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeName {
    pub node_type: String,
    pub type_descriptions: TypeDescriptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<Box<TypeName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Box<TypeName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<Box<TypeName>>,
}

/// A declared variable, or a member of one, occupying part of a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableInfo {
    pub name: String,
    /// Access path from the top-level variable, e.g. `position.owner`
    pub full_name: String,
    pub type_name: TypeName,
    /// Width in bits inside the slot
    pub bits: u16,
}

/// Variables of one slot keyed by bit offset
pub type SlotVariables = BTreeMap<u32, VariableInfo>;

/// Slot holding top-level variables directly, or a slot nothing maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawSlotInfo {
    pub resolved: bool,
    pub variables: SlotVariables,
}

/// Slot inside the data area of a long `string` or `bytes` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSlotInfo {
    pub resolved: bool,
    pub variables: SlotVariables,
    /// Declared slot of the string or bytes variable
    pub base_slot: String,
    /// First data slot, keccak of the declared slot
    pub key: String,
    /// Byte offset of this slot from the start of the data
    pub offset: u64,
}

/// Slot reached through a mapping lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSlotInfo {
    pub resolved: bool,
    pub variables: SlotVariables,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_key: Option<String>,
    /// Slot offset from the value's first slot
    pub offset: u64,
}

/// Slot inside an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySlotInfo {
    pub resolved: bool,
    pub variables: SlotVariables,
    /// First element slot (declared slot for static arrays, keccak of it for dynamic ones)
    pub base_slot: String,
    /// Index of the first element stored in this slot
    pub offset: u64,
}

/// Slot inside a top-level struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructSlotInfo {
    pub resolved: bool,
    pub variables: SlotVariables,
    /// Slot index relative to the struct's first slot
    pub offset: u64,
}

/// Classification of one touched slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SlotInfo {
    Raw(RawSlotInfo),
    Dynamic(DynamicSlotInfo),
    Mapping(MappingSlotInfo),
    Array(ArraySlotInfo),
    Struct(StructSlotInfo),
}

impl SlotInfo {
    /// A slot no declared variable accounts for
    pub fn unresolved() -> Self {
        SlotInfo::Raw(RawSlotInfo {
            resolved: false,
            variables: SlotVariables::new(),
        })
    }

    pub fn resolved(&self) -> bool {
        match self {
            SlotInfo::Raw(info) => info.resolved,
            SlotInfo::Dynamic(info) => info.resolved,
            SlotInfo::Mapping(info) => info.resolved,
            SlotInfo::Array(info) => info.resolved,
            SlotInfo::Struct(info) => info.resolved,
        }
    }

    pub fn variables(&self) -> &SlotVariables {
        match self {
            SlotInfo::Raw(info) => &info.variables,
            SlotInfo::Dynamic(info) => &info.variables,
            SlotInfo::Mapping(info) => &info.variables,
            SlotInfo::Array(info) => &info.variables,
            SlotInfo::Struct(info) => &info.variables,
        }
    }

    /// The wire `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            SlotInfo::Raw(_) => "raw",
            SlotInfo::Dynamic(_) => "dynamic",
            SlotInfo::Mapping(_) => "mapping",
            SlotInfo::Array(_) => "array",
            SlotInfo::Struct(_) => "struct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_string: String,
}

/// A struct declaration as listed in the storage catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructCatalogEntry {
    pub name: String,
    pub members: Vec<MemberCatalogEntry>,
}

/// An array-typed declared variable as listed in the storage catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayCatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_string: String,
}

/// Classification of every touched slot of one contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageResponse {
    /// Every struct the layout defines
    pub all_structs: Vec<StructCatalogEntry>,
    /// Array-typed top-level variables
    pub arrays: Vec<ArrayCatalogEntry>,
    /// Structs referenced by the declared variables
    pub structs: Vec<StructCatalogEntry>,
    pub slots: BTreeMap<String, SlotInfo>,
}

impl StorageResponse {
    /// Number of slots that resolved to at least one variable
    pub fn resolved_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.resolved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint256() -> TypeName {
        TypeName {
            node_type: "ElementaryTypeName".to_string(),
            type_descriptions: TypeDescriptions {
                type_identifier: "t_uint256".to_string(),
                type_string: "uint256".to_string(),
            },
            key_type: None,
            value_type: None,
            base_type: None,
        }
    }

    #[test]
    fn test_unresolved_slot_shape() {
        let json = serde_json::to_value(SlotInfo::unresolved()).unwrap();
        assert_eq!(json["type"], "raw");
        assert_eq!(json["resolved"], false);
        assert!(json["variables"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_mapping_slot_shape() {
        let mut variables = SlotVariables::new();
        variables.insert(
            0,
            VariableInfo {
                name: "balances".to_string(),
                full_name: "balances[0xabc]".to_string(),
                type_name: uint256(),
                bits: 256,
            },
        );
        let slot = SlotInfo::Mapping(MappingSlotInfo {
            resolved: true,
            variables,
            base_slot: Some(format!("0x{:064x}", 5)),
            mapping_key: Some("0xabc".to_string()),
            offset: 0,
        });

        assert!(slot.resolved());
        assert_eq!(slot.kind(), "mapping");

        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["type"], "mapping");
        assert_eq!(json["mappingKey"], "0xabc");
        assert_eq!(json["variables"]["0"]["fullName"], "balances[0xabc]");
        assert_eq!(json["variables"]["0"]["typeName"]["nodeType"], "ElementaryTypeName");
        assert!(json["variables"]["0"]["typeName"].get("keyType").is_none());
    }

    #[test]
    fn test_unresolved_mapping_omits_key() {
        let slot = SlotInfo::Mapping(MappingSlotInfo {
            resolved: false,
            variables: SlotVariables::new(),
            base_slot: None,
            mapping_key: None,
            offset: 0,
        });

        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["type"], "mapping");
        assert_eq!(json["resolved"], false);
        assert!(json.get("mappingKey").is_none());
        assert!(json.get("baseSlot").is_none());
    }

    #[test]
    fn test_storage_response_catalog_keys() {
        let response = StorageResponse {
            arrays: vec![ArrayCatalogEntry {
                name: "items".to_string(),
                type_string: "uint256[]".to_string(),
            }],
            ..StorageResponse::default()
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["arrays"][0]["type"], "uint256[]");
        assert!(json["allStructs"].as_array().unwrap().is_empty());
        assert_eq!(response.resolved_count(), 0);
    }
}
