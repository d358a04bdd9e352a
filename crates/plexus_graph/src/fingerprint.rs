// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content fingerprints used as cache keys.
//!
//! A [`Fingerprint`] is a 128-bit xxh3 digest of everything that determines a
//! plug's value under a context: the node type, the plug's position on the
//! node, the fingerprints of its dependencies and any context entries the
//! node reads.

use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// Fixed-size digest of a plug's computed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fingerprint(pub u128);

impl Fingerprint {
    /// Get the raw digest
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Low 64 bits, used for shard selection and sampling
    pub fn low_bits(&self) -> u64 {
        self.0 as u64
    }

    /// Get the fingerprint as a hex string
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Streaming builder for fingerprints.
///
/// Every variable-length field is length-prefixed so that adjacent fields
/// cannot alias ("ab" + "c" hashes differently from "a" + "bc").
pub struct FingerprintHasher {
    state: Xxh3,
}

impl FingerprintHasher {
    /// Create a new hasher
    pub fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    /// Append raw bytes
    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.state.update(&(bytes.len() as u64).to_le_bytes());
        self.state.update(bytes);
        self
    }

    /// Append a string
    pub fn append_str(&mut self, value: &str) -> &mut Self {
        self.append_bytes(value.as_bytes())
    }

    /// Append a single tag byte
    pub fn append_tag(&mut self, tag: u8) -> &mut Self {
        self.state.update(&[tag]);
        self
    }

    /// Append a boolean
    pub fn append_bool(&mut self, value: bool) -> &mut Self {
        self.append_tag(u8::from(value))
    }

    /// Append a signed integer
    pub fn append_i32(&mut self, value: i32) -> &mut Self {
        self.state.update(&value.to_le_bytes());
        self
    }

    /// Append an unsigned integer
    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.state.update(&value.to_le_bytes());
        self
    }

    /// Append a float by its bit pattern
    pub fn append_f32(&mut self, value: f32) -> &mut Self {
        self.state.update(&value.to_bits().to_le_bytes());
        self
    }

    /// Append a slice of floats
    pub fn append_f32s(&mut self, values: &[f32]) -> &mut Self {
        self.append_u64(values.len() as u64);
        for value in values {
            self.append_f32(*value);
        }
        self
    }

    /// Append another fingerprint
    pub fn append(&mut self, fingerprint: Fingerprint) -> &mut Self {
        self.state.update(&fingerprint.0.to_le_bytes());
        self
    }

    /// Finish and produce the fingerprint
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.state.digest128())
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let mut a = FingerprintHasher::new();
        a.append_str("Add").append_i32(5);
        let mut b = FingerprintHasher::new();
        b.append_str("Add").append_i32(5);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_length_prefix_prevents_aliasing() {
        let mut a = FingerprintHasher::new();
        a.append_str("ab").append_str("c");
        let mut b = FingerprintHasher::new();
        b.append_str("a").append_str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_hex_is_fixed_width() {
        assert_eq!(Fingerprint(1).to_hex().len(), 32);
    }
}
