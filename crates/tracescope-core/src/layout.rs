//! Declared storage layout of a contract
//!
//! A [`ContractLayout`] lists the state variables of a contract in declaration
//! order together with the struct definitions they reference. Slots are not
//! stored here; they follow from the declaration order and the packing rules
//! applied by the storage layout walker in `tracescope-ethereum`.

use crate::storage::{
    ArrayCatalogEntry, MemberCatalogEntry, StructCatalogEntry, TypeDescriptions, TypeName,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Declared variables and struct definitions of one contract
///
/// # Fields
///
/// - `contract_name`: Human-readable name of the contract
/// - `variables`: State variables in declaration order
/// - `structs`: Struct definitions referenced by name from [`TypeDescriptor::Struct`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLayout {
    pub contract_name: String,
    pub variables: Vec<DeclaredVariable>,
    #[serde(default)]
    pub structs: Vec<StructDefinition>,
}

/// A named variable or struct member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredVariable {
    pub name: String,
    pub type_name: TypeDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub members: Vec<DeclaredVariable>,
}

/// Declared type of a variable
///
/// Serialized with a `kind` discriminator:
///
/// ```json
/// { "kind": "mapping",
///   "key": { "kind": "elementary", "name": "address" },
///   "value": { "kind": "array", "base": { "kind": "struct", "name": "Deposit" } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeDescriptor {
    Elementary {
        name: String,
    },
    Mapping {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    /// `length` is `None` for dynamic arrays
    Array {
        base: Box<TypeDescriptor>,
        #[serde(default)]
        length: Option<i64>,
    },
    Struct {
        name: String,
    },
}

/// Storage shape of an elementary type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementaryStorage {
    /// Value type stored inline and packed with neighbours
    Value { bytes: u8 },
    /// `string` or `bytes`: one anchor slot plus hashed data for long values
    DynamicBytes,
}

/// Storage shape of an elementary type name, `None` if the name is not known
///
/// Recognizes `bool`, `address`, `uintN`/`intN`, `bytesN`, `string`, `bytes`,
/// plus `enum X` (one byte) and `contract X`/`interface X` (an address).
pub fn elementary_storage(name: &str) -> Option<ElementaryStorage> {
    let name = name.trim();
    match name {
        "bool" | "byte" => return Some(ElementaryStorage::Value { bytes: 1 }),
        "address" | "address payable" => return Some(ElementaryStorage::Value { bytes: 20 }),
        "uint" | "int" => return Some(ElementaryStorage::Value { bytes: 32 }),
        "string" | "bytes" => return Some(ElementaryStorage::DynamicBytes),
        _ => {}
    }

    if name.starts_with("enum ") {
        return Some(ElementaryStorage::Value { bytes: 1 });
    }
    if name.starts_with("contract ") || name.starts_with("interface ") {
        return Some(ElementaryStorage::Value { bytes: 20 });
    }

    if let Some(bits) = name.strip_prefix("uint").or_else(|| name.strip_prefix("int")) {
        let bits: u16 = bits.parse().ok()?;
        if bits == 0 || bits > 256 || bits % 8 != 0 {
            return None;
        }
        return Some(ElementaryStorage::Value {
            bytes: (bits / 8) as u8,
        });
    }

    if let Some(len) = name.strip_prefix("bytes") {
        let len: u8 = len.parse().ok()?;
        if (1..=32).contains(&len) {
            return Some(ElementaryStorage::Value { bytes: len });
        }
    }

    None
}

impl TypeDescriptor {
    pub fn elementary(name: impl Into<String>) -> Self {
        TypeDescriptor::Elementary { name: name.into() }
    }

    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn dynamic_array(base: TypeDescriptor) -> Self {
        TypeDescriptor::Array {
            base: Box::new(base),
            length: None,
        }
    }

    pub fn fixed_array(base: TypeDescriptor, length: i64) -> Self {
        TypeDescriptor::Array {
            base: Box::new(base),
            length: Some(length),
        }
    }

    pub fn struct_ref(name: impl Into<String>) -> Self {
        TypeDescriptor::Struct { name: name.into() }
    }

    /// Whether values of this type keep their contents at a hashed location
    ///
    /// True for mappings, dynamic arrays, `string` and `bytes`. Their declared
    /// slot only anchors the keccak derivation of the actual data slots.
    pub fn is_hashed_container(&self) -> bool {
        match self {
            TypeDescriptor::Mapping { .. } => true,
            TypeDescriptor::Array { length: None, .. } => true,
            TypeDescriptor::Elementary { name } => {
                elementary_storage(name) == Some(ElementaryStorage::DynamicBytes)
            }
            _ => false,
        }
    }

    /// Solidity source spelling, e.g. `mapping(address => uint256)`
    pub fn type_string(&self) -> String {
        match self {
            TypeDescriptor::Elementary { name } => name.clone(),
            TypeDescriptor::Mapping { key, value } => {
                format!("mapping({} => {})", key.type_string(), value.type_string())
            }
            TypeDescriptor::Array { base, length } => match length {
                Some(len) => format!("{}[{}]", base.type_string(), len),
                None => format!("{}[]", base.type_string()),
            },
            TypeDescriptor::Struct { name } => format!("struct {}", name),
        }
    }

    /// Compiler-style identifier, e.g. `t_mapping$_t_address_$_t_uint256_$`
    pub fn type_identifier(&self) -> String {
        match self {
            TypeDescriptor::Elementary { name } => match name.as_str() {
                "string" | "bytes" => format!("t_{}_storage", name),
                other => format!("t_{}", other.replace(' ', "_")),
            },
            TypeDescriptor::Mapping { key, value } => format!(
                "t_mapping$_{}_$_{}_$",
                key.type_identifier(),
                value.type_identifier()
            ),
            TypeDescriptor::Array { base, length } => match length {
                Some(len) => format!("t_array$_{}_${}_storage", base.type_identifier(), len),
                None => format!("t_array$_{}_$dyn_storage", base.type_identifier()),
            },
            TypeDescriptor::Struct { name } => format!("t_struct$_{}_storage", name),
        }
    }

    /// Convert to the AST-shaped [`TypeName`] used in storage responses
    pub fn to_type_name(&self) -> TypeName {
        let (node_type, key_type, value_type, base_type) = match self {
            TypeDescriptor::Elementary { .. } => ("ElementaryTypeName", None, None, None),
            TypeDescriptor::Mapping { key, value } => (
                "Mapping",
                Some(Box::new(key.to_type_name())),
                Some(Box::new(value.to_type_name())),
                None,
            ),
            TypeDescriptor::Array { base, .. } => {
                ("ArrayTypeName", None, None, Some(Box::new(base.to_type_name())))
            }
            TypeDescriptor::Struct { .. } => ("UserDefinedTypeName", None, None, None),
        };

        TypeName {
            node_type: node_type.to_string(),
            type_descriptions: TypeDescriptions {
                type_identifier: self.type_identifier(),
                type_string: self.type_string(),
            },
            key_type,
            value_type,
            base_type,
        }
    }

    /// Struct named by this type, looking through mapping values and array bases
    fn referenced_struct(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Struct { name } => Some(name),
            TypeDescriptor::Mapping { value, .. } => value.referenced_struct(),
            TypeDescriptor::Array { base, .. } => base.referenced_struct(),
            TypeDescriptor::Elementary { .. } => None,
        }
    }
}

impl DeclaredVariable {
    pub fn new(name: impl Into<String>, type_name: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            type_name,
        }
    }
}

impl StructDefinition {
    pub fn catalog_entry(&self) -> StructCatalogEntry {
        StructCatalogEntry {
            name: self.name.clone(),
            members: self
                .members
                .iter()
                .map(|member| MemberCatalogEntry {
                    name: member.name.clone(),
                    type_string: member.type_name.type_string(),
                })
                .collect(),
        }
    }
}

impl ContractLayout {
    pub fn find_struct(&self, name: &str) -> Option<&StructDefinition> {
        self.structs.iter().find(|definition| definition.name == name)
    }

    /// Every struct definition, in definition order
    pub fn all_struct_catalog(&self) -> Vec<StructCatalogEntry> {
        self.structs.iter().map(StructDefinition::catalog_entry).collect()
    }

    /// Struct definitions reachable from the declared variables, in definition order
    ///
    /// Unknown struct names are skipped here; placement reports them.
    pub fn used_struct_catalog(&self) -> Vec<StructCatalogEntry> {
        let mut used = BTreeSet::new();
        let mut pending: Vec<&str> = self
            .variables
            .iter()
            .filter_map(|variable| variable.type_name.referenced_struct())
            .collect();

        while let Some(name) = pending.pop() {
            if !used.insert(name) {
                continue;
            }
            if let Some(definition) = self.find_struct(name) {
                pending.extend(
                    definition
                        .members
                        .iter()
                        .filter_map(|member| member.type_name.referenced_struct()),
                );
            }
        }

        self.structs
            .iter()
            .filter(|definition| used.contains(definition.name.as_str()))
            .map(StructDefinition::catalog_entry)
            .collect()
    }

    /// Top-level array variables with their type spelling
    pub fn array_catalog(&self) -> Vec<ArrayCatalogEntry> {
        self.variables
            .iter()
            .filter(|variable| matches!(variable.type_name, TypeDescriptor::Array { .. }))
            .map(|variable| ArrayCatalogEntry {
                name: variable.name.clone(),
                type_string: variable.type_name.type_string(),
            })
            .collect()
    }
}
