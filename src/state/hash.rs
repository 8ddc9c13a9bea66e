//! Attribute hashing for drift detection.
//!
//! This module provides deterministic hashing of snapshot attributes so the
//! Read path can tell whether the remote object changed since it was last
//! recorded.

use sha2::{Digest, Sha256};

use crate::control_plane::Attributes;

/// Hasher for computing attribute hashes.
#[derive(Debug, Default)]
pub struct AttributeHasher;

impl AttributeHasher {
    /// Creates a new attribute hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of a full attribute map.
    ///
    /// Keys are visited in sorted order and nested objects serialize with
    /// sorted keys, so equal maps always hash equally.
    #[must_use]
    pub fn hash_attributes(&self, attributes: &Attributes) -> String {
        let mut hasher = Sha256::new();

        for (key, value) in attributes {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.to_string().as_bytes());
            hasher.update([0u8]);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_hash_is_order_independent() {
        let hasher = AttributeHasher::new();
        let a = attrs(&[("name", json!("lb")), ("port", json!(443))]);
        let b = attrs(&[("port", json!(443)), ("name", json!("lb"))]);

        assert_eq!(hasher.hash_attributes(&a), hasher.hash_attributes(&b));
    }

    #[test]
    fn test_different_values_different_hash() {
        let hasher = AttributeHasher::new();
        let a = attrs(&[("size", json!(10))]);
        let b = attrs(&[("size", json!(20))]);

        assert_ne!(hasher.hash_attributes(&a), hasher.hash_attributes(&b));
    }

    #[test]
    fn test_short_hash() {
        let hasher = AttributeHasher::new();
        assert_eq!(hasher.short_hash("abcdef1234567890"), "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(AttributeHasher::hashes_match("abc123", "abc123"));
        assert!(!AttributeHasher::hashes_match("abc123", "abc124"));
        assert!(!AttributeHasher::hashes_match("abc123", "abc12"));
    }
}
