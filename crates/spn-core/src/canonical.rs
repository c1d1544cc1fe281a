//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the only input accepted by signing and verification
//! in `spn-crypto`. Approvals, sign documents and signed approval messages are
//! all rendered through it, so two providers that serialize the same logical
//! value always produce the same bytes.
//!
//! ## Rules
//!
//! 1. **Reject floats.** Heights, sizes and amounts are integers or strings.
//! 2. **Sorted keys, compact separators.** Output is RFC 8785 (JCS) via
//!    `serde_jcs`.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// The inner buffer is private; [`CanonicalBytes::new`] is the only
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Render `obj` as sorted compact JSON.
    ///
    /// # Errors
    ///
    /// `FloatRejected` for the first non-integer number found,
    /// `SerializationFailed` if serde cannot render the value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        if let Some(f) = first_float(&value) {
            return Err(CanonicalizationError::FloatRejected(f));
        }
        Ok(Self(serde_jcs::to_vec(&value)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The signed-message body returned to approval callers.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Depth-first search for a number that is neither `i64` nor `u64`.
fn first_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => n.as_f64(),
        Value::Array(items) => items.iter().find_map(first_float),
        Value::Object(map) => map.values().find_map(first_float),
        _ => None,
    }
}
