//! # Collaborator Traits
//!
//! The protocols consume external services only through these narrow,
//! object-safe capability traits. Production wiring supplies RPC clients;
//! tests and the development binary use the in-memory implementations in
//! [`crate::memory`] and the filesystem piece store in [`crate::fs_store`].
//!
//! All traits are `Send + Sync` so they can sit behind `Arc<dyn _>` in the
//! gateway state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spn_core::{BucketInfo, Checksum, ObjectId, ObjectInfo, OperatorAddress, SpError, StorageParams};
use spn_crypto::{Ed25519Signature, IntegrityRecord};
use spn_task::{CreateBucketApproval, CreateObjectApproval, ReplicatePieceApproval, Task};

/// Operations checked by the authorization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOp {
    AskCreateBucketApproval,
    AskCreateObjectApproval,
    GetChallengePieceInfo,
}

impl AuthOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AskCreateBucketApproval => "ask_create_bucket_approval",
            Self::AskCreateObjectApproval => "ask_create_object_approval",
            Self::GetChallengePieceInfo => "get_challenge_piece_info",
        }
    }
}

impl std::fmt::Display for AuthOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether `account` may perform `op` on a bucket or object.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(false)` is a refusal; `Err` is a failure to decide.
    async fn verify_authorize(
        &self,
        op: AuthOp,
        account: &OperatorAddress,
        bucket: &str,
        object: &str,
    ) -> Result<bool, SpError>;
}

/// Read access to the settlement chain.
///
/// Implementations report absent records as [`SpError::NotFound`] and every
/// other failure as [`SpError::ConsensusUnavailable`].
#[async_trait]
pub trait Consensus: Send + Sync {
    async fn query_object_info(&self, id: ObjectId) -> Result<ObjectInfo, SpError>;

    async fn query_bucket_info(&self, bucket_name: &str) -> Result<BucketInfo, SpError>;

    /// Parameters in force at `timestamp` (unix seconds).
    async fn query_storage_params(&self, timestamp: i64) -> Result<StorageParams, SpError>;

    async fn current_height(&self) -> Result<u64, SpError>;
}

/// Result of asking an approver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome<T> {
    /// The approver signed the message.
    Approved(T),
    /// The approver declined, with its reason.
    Refused(String),
}

/// Data returned for a challenge: the stream's integrity hash, its ordered
/// piece checksums, and the challenged piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeInfo {
    pub integrity_hash: Checksum,
    pub checksums: Vec<Checksum>,
    pub data: Vec<u8>,
}

/// Result of finalizing a received stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityProof {
    pub integrity_hash: Checksum,
    pub signature: Ed25519Signature,
}

/// Runs tasks on behalf of the gateway.
///
/// Each method expects the matching [`spn_task::TaskPayload`] variant and
/// reports any other as [`SpError::Unsupported`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn ask_create_bucket_approval(
        &self,
        task: &Task,
    ) -> Result<ApprovalOutcome<CreateBucketApproval>, SpError>;

    async fn ask_create_object_approval(
        &self,
        task: &Task,
    ) -> Result<ApprovalOutcome<CreateObjectApproval>, SpError>;

    async fn ask_replicate_piece_approval(
        &self,
        task: &Task,
    ) -> Result<ApprovalOutcome<ReplicatePieceApproval>, SpError>;

    async fn get_challenge_info(&self, task: &Task) -> Result<ChallengeInfo, SpError>;

    /// Store one received piece.
    async fn replicate_piece(&self, task: &Task, data: Vec<u8>) -> Result<(), SpError>;

    /// Finalize a received stream.
    async fn done_replicate_piece(&self, task: &Task) -> Result<IntegrityProof, SpError>;
}

/// Blob storage for pieces, keyed by piece key.
#[async_trait]
pub trait PieceStore: Send + Sync {
    /// Write a piece, replacing any previous value.
    async fn put_piece(&self, key: &str, data: Vec<u8>) -> Result<(), SpError>;

    /// Read a piece. Absent pieces are [`SpError::NotFound`].
    async fn get_piece(&self, key: &str) -> Result<Vec<u8>, SpError>;

    /// Delete a piece. Deleting an absent piece succeeds.
    async fn delete_piece(&self, key: &str) -> Result<(), SpError>;
}

/// Integrity records, keyed by object and redundancy index.
#[async_trait]
pub trait IntegrityStore: Send + Sync {
    async fn set_integrity(&self, record: IntegrityRecord) -> Result<(), SpError>;

    /// Absent records are [`SpError::NotFound`].
    async fn get_integrity(
        &self,
        object_id: ObjectId,
        redundancy_idx: i32,
    ) -> Result<IntegrityRecord, SpError>;
}
