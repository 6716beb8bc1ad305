//! Address collection during trace normalization
//!
//! Every `from`/`to` seen in a call tree is recorded so the assembled response
//! can carry metadata for each of them.

use std::collections::BTreeSet;

/// Ordered, deduplicated set of lowercase addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressRegistry {
    addresses: BTreeSet<String>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an address, returning whether it was new
    ///
    /// Empty strings are ignored. Addresses are compared case-insensitively.
    pub fn add(&mut self, address: &str) -> bool {
        let address = normalize_address(address);
        if address.is_empty() {
            return false;
        }
        self.addresses.insert(address)
    }

    /// All recorded addresses in ascending order
    pub fn all(&self) -> &BTreeSet<String> {
        &self.addresses
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(&normalize_address(address))
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }
}

/// Lowercase, whitespace-trimmed form used as the registry key
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Whether `address` is one of the precompiles at `0x01..=0x11`
///
/// Only full 20-byte addresses qualify.
pub fn is_precompile(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let significant = digits.trim_start_matches('0');
    significant.len() <= 2
        && u8::from_str_radix(significant, 16).is_ok_and(|n| (0x01..=0x11).contains(&n))
}
