//! Solidity storage placement
//!
//! State variables are laid out in declaration order starting at slot 0:
//!
//! - value types are packed into the current slot while they fit, and start a
//!   new slot otherwise
//! - structs and static arrays always start a new slot, and whatever follows
//!   them starts a new slot too
//! - mappings, dynamic arrays, `string` and `bytes` take one full slot that
//!   anchors their hashed data
//!
//! Offsets are reported in bits from the low-order end of the slot word.

use alloy_primitives::U256;
use tracescope_core::{
    elementary_storage, DeclaredVariable, ElementaryStorage, SlotResolutionError,
    StructDefinition, TypeDescriptor,
};

/// Bytes in one storage slot
pub const SLOT_BYTES: u32 = 32;

/// Storage consumed by a value of some type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footprint {
    /// Shares a slot with neighbours when it fits
    Packed { bytes: u32 },
    /// Owns this many whole slots
    Slots(U256),
}

impl Footprint {
    pub fn slot_count(&self) -> U256 {
        match self {
            Footprint::Packed { .. } => U256::from(1),
            Footprint::Slots(count) => *count,
        }
    }

    /// Width in bits of a packed value, a full word otherwise
    pub fn bits(&self) -> u16 {
        match self {
            Footprint::Packed { bytes } => (*bytes * 8) as u16,
            Footprint::Slots(_) => 256,
        }
    }
}

/// Where one declared variable landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<'v> {
    pub variable: &'v DeclaredVariable,
    pub slot: U256,
    pub offset_bits: u32,
    pub footprint: Footprint,
}

impl Placement<'_> {
    /// Whether `slot` lies inside the slots this variable occupies
    pub fn contains(&self, slot: U256) -> bool {
        slot.checked_sub(self.slot)
            .is_some_and(|rel| rel < self.footprint.slot_count())
    }
}

/// Next free position while laying out a sequence of variables
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    slot: U256,
    offset: u32,
}

impl Cursor {
    fn claim(&mut self, footprint: Footprint) -> Option<(U256, u32)> {
        match footprint {
            Footprint::Packed { bytes } => {
                if self.offset + bytes > SLOT_BYTES {
                    self.next_slot()?;
                }
                let at = (self.slot, self.offset * 8);
                self.offset += bytes;
                Some(at)
            }
            Footprint::Slots(count) => {
                if self.offset > 0 {
                    self.next_slot()?;
                }
                let at = (self.slot, 0);
                self.slot = self.slot.checked_add(count)?;
                Some(at)
            }
        }
    }

    fn next_slot(&mut self) -> Option<()> {
        self.slot = self.slot.checked_add(U256::from(1))?;
        self.offset = 0;
        Some(())
    }
}

/// Assigns slots to declared variables in order
///
/// # Examples
///
/// ```rust,ignore
/// let mut walker = StorageLayoutWalker::new(&layout.structs);
/// for variable in &layout.variables {
///     let (slot, offset_bits) = walker.compute_slot(variable)?;
///     println!("{} at {} +{}", variable.name, slot, offset_bits);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayoutWalker<'s> {
    structs: &'s [StructDefinition],
    base: U256,
    cursor: Cursor,
}

impl<'s> StorageLayoutWalker<'s> {
    /// Start laying out at slot 0
    pub fn new(structs: &'s [StructDefinition]) -> Self {
        Self::starting_at(structs, U256::ZERO)
    }

    /// Start laying out at `base`, as for the members of a struct stored there
    pub fn starting_at(structs: &'s [StructDefinition], base: U256) -> Self {
        Self {
            structs,
            base,
            cursor: Cursor {
                slot: base,
                offset: 0,
            },
        }
    }

    /// Place the next variable and return its slot and bit offset
    pub fn compute_slot(
        &mut self,
        variable: &DeclaredVariable,
    ) -> Result<(U256, u32), SlotResolutionError> {
        let placement = self.place(variable)?;
        Ok((placement.slot, placement.offset_bits))
    }

    /// Place the next variable
    pub fn place<'v>(
        &mut self,
        variable: &'v DeclaredVariable,
    ) -> Result<Placement<'v>, SlotResolutionError> {
        let footprint = footprint(self.structs, &variable.name, &variable.type_name)?;
        let (slot, offset_bits) = self
            .cursor
            .claim(footprint)
            .ok_or_else(|| SlotResolutionError::Overflow(variable.name.clone()))?;
        Ok(Placement {
            variable,
            slot,
            offset_bits,
            footprint,
        })
    }

    /// Place every variable of `variables` in order
    pub fn place_all<'v>(
        &mut self,
        variables: &'v [DeclaredVariable],
    ) -> Result<Vec<Placement<'v>>, SlotResolutionError> {
        variables.iter().map(|variable| self.place(variable)).collect()
    }

    /// Slots used so far, counting a partly filled slot
    pub fn span(&self) -> U256 {
        let used = self.cursor.slot - self.base;
        if self.cursor.offset > 0 {
            used + U256::from(1)
        } else {
            used
        }
    }
}

/// Storage footprint of a value of type `ty`
///
/// `name` only labels errors.
pub fn footprint(
    structs: &[StructDefinition],
    name: &str,
    ty: &TypeDescriptor,
) -> Result<Footprint, SlotResolutionError> {
    footprint_inner(structs, name, ty, &mut Vec::new())
}

fn footprint_inner<'s>(
    structs: &'s [StructDefinition],
    name: &str,
    ty: &TypeDescriptor,
    visiting: &mut Vec<&'s str>,
) -> Result<Footprint, SlotResolutionError> {
    match ty {
        TypeDescriptor::Elementary { name: type_name } => match elementary_storage(type_name) {
            Some(ElementaryStorage::Value { bytes }) => Ok(Footprint::Packed {
                bytes: u32::from(bytes),
            }),
            Some(ElementaryStorage::DynamicBytes) => Ok(Footprint::Packed { bytes: SLOT_BYTES }),
            None => Err(SlotResolutionError::UnknownType(type_name.clone())),
        },
        TypeDescriptor::Mapping { .. } | TypeDescriptor::Array { length: None, .. } => {
            Ok(Footprint::Packed { bytes: SLOT_BYTES })
        }
        TypeDescriptor::Array {
            base,
            length: Some(length),
        } => {
            if *length < 1 {
                return Err(SlotResolutionError::InvalidLength {
                    name: name.to_string(),
                    length: *length,
                });
            }
            let length = U256::from(*length as u64);
            match footprint_inner(structs, name, base, visiting)? {
                Footprint::Packed { bytes } => {
                    let per_slot = U256::from(SLOT_BYTES / bytes);
                    Ok(Footprint::Slots((length + per_slot - U256::from(1)) / per_slot))
                }
                Footprint::Slots(element_slots) => length
                    .checked_mul(element_slots)
                    .map(Footprint::Slots)
                    .ok_or_else(|| SlotResolutionError::Overflow(name.to_string())),
            }
        }
        TypeDescriptor::Struct { name: struct_name } => {
            let definition = find_struct(structs, struct_name)?;
            if visiting.contains(&definition.name.as_str()) {
                return Err(SlotResolutionError::RecursiveStruct(struct_name.clone()));
            }
            visiting.push(&definition.name);

            let mut cursor = Cursor::default();
            for member in &definition.members {
                let member_footprint =
                    footprint_inner(structs, &member.name, &member.type_name, visiting)?;
                cursor
                    .claim(member_footprint)
                    .ok_or_else(|| SlotResolutionError::Overflow(struct_name.clone()))?;
            }
            visiting.pop();

            let mut slots = cursor.slot;
            if cursor.offset > 0 {
                slots += U256::from(1);
            }
            Ok(Footprint::Slots(slots.max(U256::from(1))))
        }
    }
}

pub(crate) fn find_struct<'s>(
    structs: &'s [StructDefinition],
    name: &str,
) -> Result<&'s StructDefinition, SlotResolutionError> {
    structs
        .iter()
        .find(|definition| definition.name == name)
        .ok_or_else(|| SlotResolutionError::UnknownStruct(name.to_string()))
}
