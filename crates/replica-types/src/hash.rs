use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length of a commit hash in bytes.
pub const HASH_LEN: usize = 20;

/// Length of a commit hash in hexadecimal characters.
pub const HASH_HEX_LEN: usize = HASH_LEN * 2;

/// Content hash identifying a commit (or any other object) in the external
/// repository.
///
/// This is the single canonical hash representation used by every layer:
/// revision cache keys, reference targets, snapshots and change records all
/// carry a `Hash`, never a raw string. It serializes as a lowercase hex
/// string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Create a `Hash` from raw bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// The all-zero hash, used by the external tool to denote "no object".
    pub const fn zero() -> Self {
        Self([0u8; HASH_LEN])
    }

    /// Returns `true` if this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Full lowercase hex representation (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex representation (first 7 characters).
    pub fn short_hex(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }

    /// Parse from a 40-character hex string (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.len() != HASH_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: HASH_HEX_LEN,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn hex_roundtrip() {
        let hash = Hash::from_hex(MAIN).unwrap();
        assert_eq!(hash.to_hex(), MAIN);
        assert_eq!(hash.to_string(), MAIN);
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let hash = Hash::from_hex(&MAIN.to_uppercase()).unwrap();
        assert_eq!(hash.to_hex(), MAIN);
    }

    #[test]
    fn short_hex_is_seven_chars() {
        let hash = Hash::from_hex(MAIN).unwrap();
        assert_eq!(hash.short_hex(), "0123456");
        assert_eq!(format!("{hash:?}"), "Hash(0123456)");
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = Hash::from_hex("abc").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 40,
                actual: 3
            }
        );
    }

    #[test]
    fn non_hex_is_rejected() {
        let bad = "z".repeat(40);
        assert!(matches!(Hash::from_hex(&bad), Err(TypeError::InvalidHex(_))));
    }

    #[test]
    fn zero_hash() {
        assert!(Hash::zero().is_zero());
        assert!(!Hash::from_hex(MAIN).unwrap().is_zero());
    }

    #[test]
    fn serializes_as_hex_string() {
        let hash = Hash::from_hex(MAIN).unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{MAIN}\""));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
