//! # Task Keys
//!
//! A task key is the kind's prefix followed by every field, each prefixed
//! with [`DELIMITER`]. Numeric fields render in plain decimal and labeled
//! fields as `label:value`. Identical parameters always yield byte-identical
//! keys, so executors may use the key to deduplicate work.
//!
//! Fields are not escaped: a delimiter inside a bucket or object name is
//! carried verbatim, exactly as the persisted key format has always done.

use serde::{Deserialize, Serialize};
use spn_core::ObjectId;

use crate::kind::TaskKind;

/// Separator written before every key field.
pub const DELIMITER: &str = "-";

/// Deterministic task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `"-f1-f2-..."`, one delimiter before each field.
pub fn combine_key<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for f in fields {
        out.push_str(DELIMITER);
        out.push_str(f.as_ref());
    }
    out
}

/// `label:value`.
pub fn labeled(label: &str, value: impl std::fmt::Display) -> String {
    format!("{label}:{value}")
}

/// Generic builder: prefix of `kind` followed by the combined fields.
pub fn build_key<S: AsRef<str>>(kind: TaskKind, fields: &[S]) -> TaskKey {
    TaskKey(format!("{}{}", kind.key_prefix(), combine_key(fields)))
}

// ── Typed builders ──────────────────────────────────────────────────

pub fn create_bucket_approval_key(bucket: &str) -> TaskKey {
    build_key(TaskKind::CreateBucketApproval, &[bucket])
}

pub fn create_object_approval_key(bucket: &str, object: &str) -> TaskKey {
    build_key(TaskKind::CreateObjectApproval, &[bucket, object])
}

pub fn replicate_piece_approval_key(bucket: &str, object: &str, id: ObjectId) -> TaskKey {
    build_key(
        TaskKind::ReplicatePieceApproval,
        &[bucket.to_string(), object.to_string(), id.to_string()],
    )
}

pub fn download_object_key(bucket: &str, object: &str, id: ObjectId, low: i64, high: i64) -> TaskKey {
    build_key(
        TaskKind::DownloadObject,
        &[
            bucket.to_string(),
            object.to_string(),
            id.to_string(),
            labeled("low", low),
            labeled("high", high),
        ],
    )
}

pub fn download_piece_key(
    bucket: &str,
    object: &str,
    piece_key: &str,
    offset: u64,
    length: u64,
) -> TaskKey {
    build_key(
        TaskKind::DownloadPiece,
        &[
            bucket.to_string(),
            object.to_string(),
            piece_key.to_string(),
            labeled("offset", offset),
            labeled("length", length),
        ],
    )
}

pub fn challenge_piece_key(
    bucket: &str,
    object: &str,
    id: ObjectId,
    segment_idx: u32,
    redundancy_idx: i32,
    user: &str,
) -> TaskKey {
    build_key(
        TaskKind::ChallengePiece,
        &[
            bucket.to_string(),
            object.to_string(),
            id.to_string(),
            labeled("sIdx", segment_idx),
            labeled("rIdx", redundancy_idx),
            user.to_string(),
        ],
    )
}

pub fn upload_object_key(bucket: &str, object: &str, id: ObjectId) -> TaskKey {
    build_key(
        TaskKind::UploadObject,
        &[bucket.to_string(), object.to_string(), id.to_string()],
    )
}

pub fn replicate_piece_key(bucket: &str, object: &str, id: ObjectId) -> TaskKey {
    build_key(
        TaskKind::ReplicatePiece,
        &[bucket.to_string(), object.to_string(), id.to_string()],
    )
}

pub fn seal_object_key(bucket: &str, object: &str, id: ObjectId) -> TaskKey {
    build_key(
        TaskKind::SealObject,
        &[bucket.to_string(), object.to_string(), id.to_string()],
    )
}

pub fn receive_piece_key(
    bucket: &str,
    object: &str,
    id: ObjectId,
    replicate_idx: u32,
    piece_idx: i32,
) -> TaskKey {
    build_key(
        TaskKind::ReceivePiece,
        &[
            bucket.to_string(),
            object.to_string(),
            id.to_string(),
            labeled("rIdx", replicate_idx),
            labeled("pIdx", piece_idx),
        ],
    )
}

pub fn gc_object_key(start_block: u64, end_block: u64, time: i64) -> TaskKey {
    build_key(
        TaskKind::GCObject,
        &[start_block.to_string(), end_block.to_string(), time.to_string()],
    )
}

pub fn gc_zombie_piece_key(time: i64) -> TaskKey {
    build_key(TaskKind::GCZombiePiece, &[time.to_string()])
}

pub fn gc_meta_key(time: i64) -> TaskKey {
    build_key(TaskKind::GCMeta, &[time.to_string()])
}
