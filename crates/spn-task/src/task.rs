//! # Tasks
//!
//! A [`Task`] is an immutable unit of work: a [`TaskPayload`] plus the
//! priority, timeout and retry budget resolved for it from a
//! [`PolicyTable`]. The kind and key are derived from the payload, so a task
//! can never carry a key that disagrees with its parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::approval::{CreateBucketApproval, CreateObjectApproval, ReplicatePieceApproval};
use crate::key::{self, TaskKey};
use crate::kind::TaskKind;
use crate::payload::{
    ChallengePieceTask, DownloadObjectTask, DownloadPieceTask, GcObjectTask, ObjectTask,
    ReceivePieceTask,
};
use crate::policy::{PolicyTable, Priority, TaskPolicy};

/// Parameters of a task, one variant per [`TaskKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum TaskPayload {
    CreateBucketApproval(CreateBucketApproval),
    CreateObjectApproval(CreateObjectApproval),
    ReplicatePieceApproval(ReplicatePieceApproval),
    DownloadObject(DownloadObjectTask),
    DownloadPiece(DownloadPieceTask),
    ChallengePiece(ChallengePieceTask),
    UploadObject(ObjectTask),
    ReplicatePiece(ObjectTask),
    SealObject(ObjectTask),
    ReceivePiece(ReceivePieceTask),
    GCObject(GcObjectTask),
    GCZombiePiece { create_time: i64 },
    GCMeta { create_time: i64 },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::CreateBucketApproval(_) => TaskKind::CreateBucketApproval,
            Self::CreateObjectApproval(_) => TaskKind::CreateObjectApproval,
            Self::ReplicatePieceApproval(_) => TaskKind::ReplicatePieceApproval,
            Self::DownloadObject(_) => TaskKind::DownloadObject,
            Self::DownloadPiece(_) => TaskKind::DownloadPiece,
            Self::ChallengePiece(_) => TaskKind::ChallengePiece,
            Self::UploadObject(_) => TaskKind::UploadObject,
            Self::ReplicatePiece(_) => TaskKind::ReplicatePiece,
            Self::SealObject(_) => TaskKind::SealObject,
            Self::ReceivePiece(_) => TaskKind::ReceivePiece,
            Self::GCObject(_) => TaskKind::GCObject,
            Self::GCZombiePiece { .. } => TaskKind::GCZombiePiece,
            Self::GCMeta { .. } => TaskKind::GCMeta,
        }
    }

    /// Deterministic key for these parameters.
    pub fn key(&self) -> TaskKey {
        match self {
            Self::CreateBucketApproval(m) => key::create_bucket_approval_key(&m.bucket_name),
            Self::CreateObjectApproval(m) => {
                key::create_object_approval_key(&m.bucket_name, &m.object_name)
            }
            Self::ReplicatePieceApproval(a) => key::replicate_piece_approval_key(
                &a.object_info.bucket_name,
                &a.object_info.object_name,
                a.object_info.id,
            ),
            Self::DownloadObject(t) => key::download_object_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                t.object_info.id,
                t.low,
                t.high,
            ),
            Self::DownloadPiece(t) => key::download_piece_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                &t.piece_key,
                t.offset,
                t.length,
            ),
            Self::ChallengePiece(t) => key::challenge_piece_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                t.object_info.id,
                t.segment_idx,
                t.redundancy_idx,
                t.user_address.as_str(),
            ),
            Self::UploadObject(t) => key::upload_object_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                t.object_info.id,
            ),
            Self::ReplicatePiece(t) => key::replicate_piece_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                t.object_info.id,
            ),
            Self::SealObject(t) => key::seal_object_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                t.object_info.id,
            ),
            Self::ReceivePiece(t) => key::receive_piece_key(
                &t.object_info.bucket_name,
                &t.object_info.object_name,
                t.object_info.id,
                t.replicate_idx,
                t.piece_idx,
            ),
            Self::GCObject(t) => key::gc_object_key(t.start_block, t.end_block, t.create_time),
            Self::GCZombiePiece { create_time } => key::gc_zombie_piece_key(*create_time),
            Self::GCMeta { create_time } => key::gc_meta_key(*create_time),
        }
    }

    /// Bytes the task is expected to move; drives the I/O timeout.
    pub fn size_hint(&self) -> u64 {
        match self {
            Self::DownloadObject(t) => u64::try_from(t.high.saturating_sub(t.low))
                .map(|n| n.saturating_add(1))
                .unwrap_or(0),
            Self::DownloadPiece(t) => t.length,
            Self::ChallengePiece(t) => t.piece_size,
            Self::UploadObject(t) | Self::ReplicatePiece(t) => t.object_info.payload_size,
            Self::ReceivePiece(t) => t.piece_size,
            Self::CreateBucketApproval(_)
            | Self::CreateObjectApproval(_)
            | Self::ReplicatePieceApproval(_)
            | Self::SealObject(_)
            | Self::GCObject(_)
            | Self::GCZombiePiece { .. }
            | Self::GCMeta { .. } => 0,
        }
    }
}

/// A unit of work with its resolved policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    payload: TaskPayload,
    policy: TaskPolicy,
}

impl Task {
    /// Build a task, resolving its policy from `table`.
    pub fn new(payload: TaskPayload, table: &PolicyTable) -> Self {
        let policy = table.resolve(payload.kind(), payload.size_hint());
        Self { payload, policy }
    }

    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    pub fn key(&self) -> TaskKey {
        self.payload.key()
    }

    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    pub fn into_payload(self) -> TaskPayload {
        self.payload
    }

    pub fn policy(&self) -> TaskPolicy {
        self.policy
    }

    pub fn priority(&self) -> Priority {
        self.policy.priority
    }

    pub fn timeout(&self) -> Duration {
        self.policy.timeout
    }

    pub fn max_retry(&self) -> u32 {
        self.policy.max_retry
    }
}
