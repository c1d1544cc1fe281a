//! # Chain Descriptors
//!
//! Read-only views of the on-chain records the node consumes: objects,
//! buckets, and the storage parameters in force when an object was created.
//! The node never writes these; they arrive from the consensus collaborator
//! or embedded in approvals and receive messages.

use serde::{Deserialize, Serialize};

use crate::digest::Checksum;
use crate::error::SpError;
use crate::identity::{ObjectId, OperatorAddress};

/// How an object's segments are made redundant across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedundancyType {
    /// Reed-Solomon erasure coding: each provider keeps one chunk per segment.
    Ec,
    /// Full replication: each provider keeps whole segments.
    Replica,
}

impl std::fmt::Display for RedundancyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ec => f.write_str("EC"),
            Self::Replica => f.write_str("REPLICA"),
        }
    }
}

/// Lifecycle status of an object on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectStatus {
    Created,
    Sealed,
}

/// Object metadata as recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub bucket_name: String,
    pub object_name: String,
    pub owner: OperatorAddress,
    pub payload_size: u64,
    pub redundancy_type: RedundancyType,
    /// `checksums[i]` is the expected integrity hash of stream `i`.
    pub checksums: Vec<Checksum>,
    /// Creation time, unix seconds. Selects the storage parameters.
    pub create_at: i64,
    pub status: ObjectStatus,
}

impl ObjectInfo {
    /// Expected integrity hash for replicate stream `idx`, if in range.
    pub fn expected_checksum(&self, idx: u32) -> Option<&Checksum> {
        self.checksums.get(idx as usize)
    }
}

/// Bucket metadata as recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub id: u64,
    pub bucket_name: String,
    pub owner: OperatorAddress,
    /// The provider that accepts uploads for this bucket.
    pub primary_sp_address: OperatorAddress,
}

/// Storage parameters governing segmentation and erasure coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageParams {
    pub max_segment_size: u64,
    pub redundant_data_chunk_num: u32,
    pub redundant_parity_chunk_num: u32,
    pub max_payload_size: u64,
}

impl StorageParams {
    /// Reject parameter sets that cannot address any piece.
    pub fn validate(&self) -> Result<(), SpError> {
        if self.max_segment_size == 0 {
            return Err(SpError::Validation(
                "max_segment_size must be positive".to_string(),
            ));
        }
        if self.redundant_data_chunk_num == 0 {
            return Err(SpError::Validation(
                "redundant_data_chunk_num must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Total number of EC streams (data plus parity).
    pub fn total_chunk_num(&self) -> u32 {
        self.redundant_data_chunk_num
            .saturating_add(self.redundant_parity_chunk_num)
    }
}

impl Default for StorageParams {
    fn default() -> Self {
        Self {
            max_segment_size: 16 * 1024 * 1024,
            redundant_data_chunk_num: 4,
            redundant_parity_chunk_num: 2,
            max_payload_size: 2 * 1024 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> ObjectInfo {
        ObjectInfo {
            id: ObjectId(9),
            bucket_name: "bucket".into(),
            object_name: "obj".into(),
            owner: OperatorAddress::from_bytes(&[1; 20]),
            payload_size: 1000,
            redundancy_type: RedundancyType::Ec,
            checksums: vec![Checksum::from_bytes([3; 32])],
            create_at: 1_700_000_000,
            status: ObjectStatus::Created,
        }
    }

    #[test]
    fn expected_checksum_is_bounds_checked() {
        let o = object();
        assert!(o.expected_checksum(0).is_some());
        assert!(o.expected_checksum(1).is_none());
    }

    #[test]
    fn object_info_json_shape() {
        let json = serde_json::to_value(object()).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["redundancy_type"], "EC");
        assert_eq!(json["status"], "CREATED");
        assert_eq!(json["checksums"][0], "03".repeat(32));
    }

    #[test]
    fn storage_params_validation() {
        assert!(StorageParams::default().validate().is_ok());
        let mut p = StorageParams::default();
        p.redundant_data_chunk_num = 0;
        assert!(p.validate().is_err());
        let mut p = StorageParams::default();
        p.max_segment_size = 0;
        assert!(p.validate().is_err());
        assert_eq!(StorageParams::default().total_chunk_num(), 6);
    }
}
