//! # Node Keys and Signatures
//!
//! A storage provider signs two things with its Ed25519 key: approvals it
//! grants (bucket, object, replicate-piece) and the integrity sign document
//! it returns when a replicate stream is finalized. Both are verified later
//! against the same node's public key.
//!
//! Signing takes `&CanonicalBytes` only, so every signature covers the
//! sorted compact JSON of a message. The seed never leaves [`Ed25519KeyPair`]:
//! it has no `Serialize` impl and its `Debug` output is opaque.
//!
//! Public keys and signatures travel as lowercase hex, both in JSON and in
//! `X-Gnfd-*` headers.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use spn_core::CanonicalBytes;

use crate::error::CryptoError;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
pub const SEED_LEN: usize = 32;

/// Decode exactly `N` bytes of hex, reporting failures through `err`.
fn decode_hex<const N: usize>(
    text: &str,
    what: &str,
    err: fn(String) -> CryptoError,
) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(text.trim()).map_err(|e| err(format!("{what}: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| err(format!("{what}: expected {N} bytes, got {}", bytes.len())))
}

// ---------------------------------------------------------------------------
// Public key
// ---------------------------------------------------------------------------

/// Public half of a node key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        decode_hex(s, "public key", CryptoError::KeyError).map(Self)
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("public key is not a curve point: {e}")))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Signature over the canonical bytes of an approval or sign document.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; SIGNATURE_LEN]);

impl Ed25519Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        <[u8; SIGNATURE_LEN]>::try_from(bytes).map(Self).map_err(|_| {
            CryptoError::MalformedSignature(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            ))
        })
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        decode_hex(s, "signature", CryptoError::MalformedSignature).map(Self)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Enough to tell two signatures apart in a log line.
        write!(f, "Ed25519Signature({}..)", hex::encode(&self.0[..6]))
    }
}

// Both wire types serialize as their hex text.
macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                <$ty>::from_hex(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Ed25519PublicKey);
hex_serde!(Ed25519Signature);

// ---------------------------------------------------------------------------
// Key pair
// ---------------------------------------------------------------------------

/// The node's signing key.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Fresh key from the OS RNG. Used when no seed is configured.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Key from the hex seed format of `SPN_SIGNING_KEY`.
    pub fn from_seed_hex(s: &str) -> Result<Self, CryptoError> {
        let seed = decode_hex::<SEED_LEN>(s, "signing seed", CryptoError::KeyError)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Deterministic: equal key and input give an equal signature, which is
    /// what lets a repeated finalize return the same proof.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Check `signature` over `data` against `public_key`.
pub fn verify(
    public_key: &Ed25519PublicKey,
    data: &CanonicalBytes,
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    public_key
        .verifying_key()?
        .verify(data.as_bytes(), &sig)
        .map_err(|_| {
            CryptoError::VerificationFailed(format!(
                "signature does not verify under {}",
                public_key.to_hex()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> CanonicalBytes {
        CanonicalBytes::new(&v).unwrap()
    }

    #[test]
    fn integrity_doc_signature_verifies() {
        let key = Ed25519KeyPair::from_seed(&[1; 32]);
        let data = doc(json!({"object_id": 7, "replicate_idx": 0, "integrity_hash": "ab"}));
        let sig = key.sign(&data);
        verify(&key.public_key(), &data, &sig).unwrap();
    }

    #[test]
    fn other_node_key_is_rejected() {
        let ours = Ed25519KeyPair::from_seed(&[1; 32]);
        let theirs = Ed25519KeyPair::from_seed(&[2; 32]);
        let data = doc(json!({"expired_height": 100}));
        let err = verify(&ours.public_key(), &data, &theirs.sign(&data)).unwrap_err();
        assert!(matches!(err, CryptoError::VerificationFailed(_)));
    }

    #[test]
    fn raised_expiry_breaks_signature() {
        let key = Ed25519KeyPair::generate();
        let sig = key.sign(&doc(json!({"expired_height": 100})));
        assert!(verify(&key.public_key(), &doc(json!({"expired_height": 101})), &sig).is_err());
    }

    #[test]
    fn seed_forms_agree_and_sign_identically() {
        let raw = Ed25519KeyPair::from_seed(&[0x2a; 32]);
        let hexed = Ed25519KeyPair::from_seed_hex(&"2a".repeat(32)).unwrap();
        assert_eq!(raw.public_key(), hexed.public_key());
        let data = doc(json!({"bucket_name": "photos"}));
        assert_eq!(raw.sign(&data), hexed.sign(&data));
    }

    #[test]
    fn wire_forms_are_hex() {
        let key = Ed25519KeyPair::from_seed(&[3; 32]);
        let pk = key.public_key();
        let sig = key.sign(&doc(json!({"y": 2})));

        assert_eq!(
            serde_json::to_string(&pk).unwrap(),
            format!("\"{}\"", pk.to_hex())
        );
        let back: Ed25519Signature =
            serde_json::from_str(&serde_json::to_string(&sig).unwrap()).unwrap();
        assert_eq!(back, sig);
        assert_eq!(sig.to_hex().len(), 2 * SIGNATURE_LEN);
        assert_eq!(Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert!(matches!(
            Ed25519PublicKey::from_hex("aabb"),
            Err(CryptoError::KeyError(_))
        ));
        assert!(matches!(
            Ed25519Signature::from_hex("zz"),
            Err(CryptoError::MalformedSignature(_))
        ));
        assert!(Ed25519Signature::from_slice(&[0; 63]).is_err());
        assert!(Ed25519KeyPair::from_seed_hex("00").is_err());
    }

    #[test]
    fn debug_hides_seed() {
        let key = Ed25519KeyPair::from_seed(&[9; 32]);
        let printed = format!("{key:?}");
        assert!(printed.contains(&key.public_key().to_hex()));
        assert!(!printed.contains(&"09".repeat(32)));
    }
}
