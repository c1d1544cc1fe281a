//! # Node Identity
//!
//! The identity a storage provider signs as. The operator address is the
//! first 20 bytes of SHA-256 over the Ed25519 public key, rendered
//! `0x`-prefixed hex.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use spn_core::{CanonicalBytes, OperatorAddress};

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::error::CryptoError;

/// Derive the operator address for a public key.
pub fn operator_address_for(public_key: &Ed25519PublicKey) -> OperatorAddress {
    let digest = Sha256::digest(public_key.as_bytes());
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    OperatorAddress::from_bytes(&addr)
}

/// Key pair, operator address and advertised endpoint of this node.
///
/// Cheap to clone; the key pair is shared.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    keypair: Arc<Ed25519KeyPair>,
    operator_address: OperatorAddress,
    endpoint: String,
}

impl NodeIdentity {
    pub fn new(keypair: Ed25519KeyPair, endpoint: impl Into<String>) -> Self {
        let operator_address = operator_address_for(&keypair.public_key());
        Self {
            keypair: Arc::new(keypair),
            operator_address,
            endpoint: endpoint.into(),
        }
    }

    pub fn operator_address(&self) -> &OperatorAddress {
        &self.operator_address
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Sign with the node key.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        self.keypair.sign(data)
    }

    /// Verify a signature against the node's own public key.
    pub fn verify_own(
        &self,
        data: &CanonicalBytes,
        signature: &Ed25519Signature,
    ) -> Result<(), CryptoError> {
        crate::ed25519::verify(&self.public_key(), data, signature)
    }
}
