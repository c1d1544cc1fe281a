//! Per-kind task parameters.

use serde::{Deserialize, Serialize};
use spn_core::{BucketInfo, Checksum, ObjectInfo, OperatorAddress, StorageParams};

/// One piece of a replicate stream pushed to this node, or the finalize
/// signal for that stream when `piece_idx < 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePieceTask {
    pub object_info: ObjectInfo,
    /// Bucket holding the object. Older pushers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_info: Option<BucketInfo>,
    pub storage_params: StorageParams,
    pub replicate_idx: u32,
    pub piece_idx: i32,
    #[serde(default)]
    pub piece_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_checksum: Option<Checksum>,
}

impl ReceivePieceTask {
    /// Whether this message finalizes the stream instead of carrying a piece.
    pub fn is_finalize(&self) -> bool {
        self.piece_idx < 0
    }

    /// Whether the bucket descriptor, when present, names the object's bucket.
    pub fn bucket_matches(&self) -> bool {
        match &self.bucket_info {
            Some(bucket) => bucket.bucket_name == self.object_info.bucket_name,
            None => true,
        }
    }
}

/// A validator's request for one stored piece plus its integrity proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengePieceTask {
    pub object_info: ObjectInfo,
    pub bucket_info: BucketInfo,
    pub storage_params: StorageParams,
    pub user_address: OperatorAddress,
    /// Negative selects the segment stream, otherwise the EC chunk index.
    pub redundancy_idx: i32,
    pub segment_idx: u32,
    pub piece_size: u64,
}

/// Inclusive byte range of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadObjectTask {
    pub object_info: ObjectInfo,
    pub user_address: OperatorAddress,
    pub low: i64,
    pub high: i64,
}

/// Byte range of one stored piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPieceTask {
    pub object_info: ObjectInfo,
    pub piece_key: String,
    pub offset: u64,
    pub length: u64,
}

/// Upload, replicate and seal act on a whole object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTask {
    pub object_info: ObjectInfo,
    pub storage_params: StorageParams,
}

/// Garbage-collect objects deleted between two block heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcObjectTask {
    pub start_block: u64,
    pub end_block: u64,
    pub create_time: i64,
}
