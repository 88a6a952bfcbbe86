// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable id assignment and the default name hash.

use std::fmt;

/// Custom type/field id assignment.
///
/// Returning `None` falls back to the default name hash, so a mapper only
/// needs to know about the names it wants to pin.
pub trait IdMapper: Send + Sync + fmt::Debug {
    /// Id for a type name.
    fn type_id(&self, type_name: &str) -> Option<i32>;

    /// Id for a field of the type identified by `type_id`.
    fn field_id(&self, type_id: i32, field_name: &str) -> Option<i32>;
}

/// Default id: `h = 31 * h + c` over the lower-cased name, wrapping.
pub fn name_hash(name: &str) -> i32 {
    name.chars()
        .flat_map(char::to_lowercase)
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_hash_is_case_insensitive() {
        assert_eq!(name_hash("Address"), name_hash("address"));
        assert_eq!(name_hash("ADDRESS"), name_hash("aDdReSs"));
        assert_ne!(name_hash("address"), name_hash("addresses"));
    }

    #[test]
    fn test_name_hash_known_values() {
        assert_eq!(name_hash(""), 0);
        assert_eq!(name_hash("a"), 97);
        assert_eq!(name_hash("ab"), 97 * 31 + 98);
        // Wraps instead of overflowing.
        let long = "z".repeat(64);
        let _ = name_hash(&long);
    }
}
