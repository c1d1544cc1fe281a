//! # Checksums
//!
//! [`Checksum`] is the 32-byte SHA-256 value the network uses for piece
//! checksums and aggregate integrity hashes. Computation lives in
//! `spn-crypto`; this module only defines the value type and its hex wire
//! form so that chain descriptors can carry expected checksums without
//! depending on the crypto crate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SpError;

/// Length of a SHA-256 checksum in bytes.
pub const CHECKSUM_LEN: usize = 32;

/// A SHA-256 checksum. Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy a checksum out of a slice.
    ///
    /// # Errors
    ///
    /// `Decode` if the slice is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SpError> {
        let arr: [u8; CHECKSUM_LEN] = bytes.try_into().map_err(|_| {
            SpError::Decode(format!(
                "checksum must be {CHECKSUM_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse a checksum from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, SpError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| SpError::Decode(format!("invalid checksum hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Render a checksum list the way it travels in a single header value:
/// hex strings joined by commas, in index order.
pub fn join_hex(checksums: &[Checksum]) -> String {
    checksums
        .iter()
        .map(Checksum::to_hex)
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`join_hex`]. An empty string is an empty list.
pub fn split_hex(s: &str) -> Result<Vec<Checksum>, SpError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(Checksum::from_hex).collect()
}
