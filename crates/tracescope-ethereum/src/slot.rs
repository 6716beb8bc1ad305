//! Keccak hashing and slot arithmetic helpers
//!
//! Solidity places dynamic data at keccak-derived slots:
//!
//! - dynamic array elements and long `string`/`bytes` data start at `keccak256(slot)`
//! - the value for mapping key `k` starts at `keccak256(enc(k) ++ slot)`, where
//!   value-type keys are padded to a word and `string`/`bytes` keys are used as is
//!
//! Slots are handled as [`U256`] and written as `0x` followed by 64 lowercase
//! hex digits.

use alloy_primitives::U256;
use tiny_keccak::{Hasher, Keccak};
use tracescope_core::{elementary_storage, ElementaryStorage, TypeDescriptor};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// First data slot of a dynamic array or long string anchored at `slot`
pub fn data_slot(slot: U256) -> U256 {
    U256::from_be_bytes(keccak256(&slot.to_be_bytes::<32>()))
}

/// Value slot for `key` in the mapping anchored at `slot`
///
/// `key` holds the key's value bytes; see [`encode_mapping_key`] for how they
/// are laid out before hashing.
pub fn mapping_slot(key_type: &TypeDescriptor, key: &[u8], slot: U256) -> U256 {
    let mut data = encode_mapping_key(key_type, key);
    data.extend_from_slice(&slot.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(&data))
}

/// Bytes a mapping key contributes to the hashed preimage
///
/// `string` and `bytes` keys are used unpadded. `bytesN` keys are left-aligned
/// and zero-filled on the right. Every other value type is right-aligned in a
/// 32-byte word. Keys already a word or longer are used as given.
pub fn encode_mapping_key(key_type: &TypeDescriptor, key: &[u8]) -> Vec<u8> {
    let name = match key_type {
        TypeDescriptor::Elementary { name } => name.trim(),
        _ => "",
    };
    let storage = elementary_storage(name);
    if storage == Some(ElementaryStorage::DynamicBytes) || key.len() >= 32 {
        return key.to_vec();
    }

    let mut word = vec![0u8; 32];
    let fixed_bytes = (name == "byte" || name.starts_with("bytes"))
        && matches!(storage, Some(ElementaryStorage::Value { .. }));
    if fixed_bytes {
        word[..key.len()].copy_from_slice(key);
    } else {
        word[32 - key.len()..].copy_from_slice(key);
    }
    word
}

/// Render a slot as `0x` + 64 lowercase hex digits
pub fn format_slot(slot: U256) -> String {
    format!("0x{}", hex::encode(slot.to_be_bytes::<32>()))
}

/// Parse a slot written as `0x`-prefixed hex or as a decimal number
pub fn parse_slot(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some("") => None,
        Some(digits) => U256::from_str_radix(digits, 16).ok(),
        None => U256::from_str_radix(raw, 10).ok(),
    }
}

/// Decode a `0x`-prefixed (or bare) hex byte string
pub fn decode_hex_bytes(raw: &str) -> Option<Vec<u8>> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).ok()
}
