//! # Checksum Engine
//!
//! A piece checksum is SHA-256 over the raw piece bytes. The integrity hash
//! of a stream is SHA-256 over its piece checksums concatenated in index
//! order, so reordering pieces changes the hash.
//!
//! Piece bytes are opaque blobs, not structured values, so this is the one
//! digest path that hashes raw bytes rather than `CanonicalBytes`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use spn_core::{Checksum, ObjectId, SpError};

/// SHA-256 of a piece.
pub fn compute_checksum(data: &[u8]) -> Checksum {
    Checksum::from_bytes(Sha256::digest(data).into())
}

/// SHA-256 over `checksums` concatenated in the given order.
pub fn compute_integrity_hash(checksums: &[Checksum]) -> Checksum {
    let mut hasher = Sha256::new();
    for c in checksums {
        hasher.update(c.as_bytes());
    }
    Checksum::from_bytes(hasher.finalize().into())
}

/// Check that `checksums` aggregate to `expected`.
///
/// # Errors
///
/// `Validation` naming both hashes when they differ.
pub fn verify_integrity(checksums: &[Checksum], expected: &Checksum) -> Result<(), SpError> {
    let actual = compute_integrity_hash(checksums);
    if &actual != expected {
        return Err(SpError::Validation(format!(
            "integrity hash mismatch: computed {actual}, expected {expected}"
        )));
    }
    Ok(())
}

/// Ordered piece checksums of one stream plus their aggregate.
///
/// `redundancy_idx` is `-1` for the segment stream written at upload, or the
/// replicate/EC stream index otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub object_id: ObjectId,
    pub redundancy_idx: i32,
    pub checksums: Vec<Checksum>,
    pub integrity_hash: Checksum,
}

impl IntegrityRecord {
    /// Build a record, computing the aggregate from `checksums`.
    pub fn new(object_id: ObjectId, redundancy_idx: i32, checksums: Vec<Checksum>) -> Self {
        let integrity_hash = compute_integrity_hash(&checksums);
        Self {
            object_id,
            redundancy_idx,
            checksums,
            integrity_hash,
        }
    }

    /// Recompute the aggregate and compare it to the stored one.
    pub fn verify(&self) -> Result<(), SpError> {
        verify_integrity(&self.checksums, &self.integrity_hash)
    }
}
