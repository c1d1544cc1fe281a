//! # spn-crypto: Cryptographic Primitives
//!
//! - **Checksum engine.** SHA-256 piece checksums and the aggregate
//!   integrity hash over an ordered checksum list.
//! - **Ed25519** signing and verification over `CanonicalBytes`.
//! - **Node identity.** The key pair, derived operator address and public
//!   endpoint a provider signs as.
//!
//! ## Crate Policy
//!
//! - Depends only on `spn-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   SHA-256 and real Ed25519.

pub mod checksum;
pub mod ed25519;
pub mod error;
pub mod node;

pub use checksum::{
    compute_checksum, compute_integrity_hash, verify_integrity, IntegrityRecord,
};
pub use ed25519::{
    verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, PUBLIC_KEY_LEN, SEED_LEN,
    SIGNATURE_LEN,
};
pub use error::CryptoError;
pub use node::{operator_address_for, NodeIdentity};
