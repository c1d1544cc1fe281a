//! Errors raised by key handling and signature verification.

use spn_core::SpError;
use thiserror::Error;

/// Cryptographic operation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material could not be parsed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Signature bytes could not be parsed.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature did not verify.
    #[error("{0}")]
    VerificationFailed(String),
}

impl From<CryptoError> for SpError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyError(msg) | CryptoError::MalformedSignature(msg) => {
                SpError::Decode(msg)
            }
            CryptoError::VerificationFailed(msg) => SpError::SignatureInvalid(msg),
        }
    }
}
