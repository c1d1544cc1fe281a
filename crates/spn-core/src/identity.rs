//! # Identifiers
//!
//! Newtypes for the identifiers the node exchanges with the chain and its
//! peers. An [`ObjectId`] cannot be passed where a segment index is expected,
//! and an [`OperatorAddress`] is always in normalized lowercase form so that
//! approval identity checks are plain equality.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpError;

/// On-chain object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = SpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| SpError::Validation(format!("invalid object id {s:?}: {e}")))
    }
}

/// Length in bytes of an operator address.
pub const OPERATOR_ADDRESS_LEN: usize = 20;

/// A storage-provider or account address: `0x` followed by 40 hex digits.
///
/// Stored lowercase. Construct with [`OperatorAddress::parse`] or
/// [`OperatorAddress::from_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperatorAddress(String);

impl OperatorAddress {
    /// Parse and normalize an address.
    ///
    /// # Errors
    ///
    /// `Validation` if the value is not `0x` plus 40 hex digits.
    pub fn parse(s: &str) -> Result<Self, SpError> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| SpError::Validation(format!("address {s:?} must start with 0x")))?;
        if body.len() != OPERATOR_ADDRESS_LEN * 2 || !body.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(SpError::Validation(format!(
                "address {s:?} must be 0x followed by {} hex digits",
                OPERATOR_ADDRESS_LEN * 2
            )));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Build an address from 20 raw bytes.
    pub fn from_bytes(bytes: &[u8; OPERATOR_ADDRESS_LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperatorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OperatorAddress {
    type Err = SpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OperatorAddress {
    type Error = SpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OperatorAddress> for String {
    fn from(addr: OperatorAddress) -> Self {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_parses_decimal() {
        assert_eq!("42".parse::<ObjectId>().unwrap(), ObjectId(42));
        assert_eq!(" 7 ".parse::<ObjectId>().unwrap(), ObjectId(7));
        assert!("-1".parse::<ObjectId>().is_err());
        assert!("0x10".parse::<ObjectId>().is_err());
    }

    #[test]
    fn address_is_normalized_to_lowercase() {
        let a = OperatorAddress::parse("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
        let b = OperatorAddress::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn address_rejects_bad_shapes() {
        assert!(OperatorAddress::parse("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(OperatorAddress::parse("0x1234").is_err());
        assert!(OperatorAddress::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn address_from_bytes() {
        let a = OperatorAddress::from_bytes(&[0x11; 20]);
        assert_eq!(a.as_str(), format!("0x{}", "11".repeat(20)));
    }

    #[test]
    fn address_serde_validates() {
        let ok: OperatorAddress =
            serde_json::from_str(&format!("\"0x{}\"", "AA".repeat(20))).unwrap();
        assert_eq!(ok.as_str(), format!("0x{}", "aa".repeat(20)));
        assert!(serde_json::from_str::<OperatorAddress>("\"nope\"").is_err());
    }
}
