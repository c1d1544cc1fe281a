//! # Replication / Receive Protocol
//!
//! A secondary provider accepts pieces pushed by the primary only under a
//! [`ReplicatePieceApproval`] it signed itself. The flow is
//!
//! ```text
//! AwaitingApproval --validate_approval--> Approved (ApprovalGrant)
//! Approved --receive_piece(piece_idx >= 0)--> Receiving(k)
//! Receiving(k) --receive_piece(piece_idx < 0)--> Finalized (IntegrityProof)
//! ```
//!
//! Any validation failure rejects the request. A stream's session is dropped
//! once it is finalized and evicted when it sits idle past its TTL. An [`ApprovalGrant`] can only
//! be obtained from [`ReceiveService::validate_approval`], so the receive
//! entry point cannot be reached with an unchecked approval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use spn_core::{Checksum, ObjectId, ObjectInfo, OperatorAddress, SpError};
use spn_task::{PolicyTable, ReceivePieceTask, ReplicatePieceApproval, Task, TaskPayload};

use crate::collaborator::{Consensus, IntegrityProof, TaskExecutor};
use crate::deadline::bounded;
use spn_crypto::NodeIdentity;

/// Proof that an approval was addressed to this node, carries this node's
/// signature, and had not expired when checked.
///
/// The grant keeps the object metadata the node signed. Pieces pushed under
/// it must describe exactly that object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalGrant {
    object_info: ObjectInfo,
    expired_height: u64,
    checked_height: Option<u64>,
}

impl ApprovalGrant {
    pub(crate) fn new(object_info: ObjectInfo, expired_height: u64, checked_height: Option<u64>) -> Self {
        Self {
            object_info,
            expired_height,
            checked_height,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_info.id
    }

    /// Object metadata as it stood in the signed approval.
    pub fn object_info(&self) -> &ObjectInfo {
        &self.object_info
    }

    pub fn expired_height(&self) -> u64 {
        self.expired_height
    }

    /// Height the expiry was checked against; `None` when the height query
    /// failed and the check was skipped.
    pub fn checked_height(&self) -> Option<u64> {
        self.checked_height
    }
}

/// What the node signs when it finalizes a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegritySignDoc {
    pub operator_address: OperatorAddress,
    pub object_id: ObjectId,
    pub replicate_idx: u32,
    pub integrity_hash: Checksum,
}

/// Received-piece bookkeeping for one `(object_id, replicate_idx)` stream.
///
/// A piece write is reserved with [`begin_write`](Self::begin_write) before
/// the bytes reach the store and released with
/// [`finish_write`](Self::finish_write) or
/// [`abandon_write`](Self::abandon_write). Finalize is refused while any
/// write is reserved, and no write can be reserved once finalize began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveSession {
    checksums: Vec<Option<Checksum>>,
    writing: usize,
    finalizing: bool,
    touched: Instant,
}

impl Default for ReceiveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveSession {
    pub fn new() -> Self {
        Self {
            checksums: Vec::new(),
            writing: 0,
            finalizing: false,
            touched: Instant::now(),
        }
    }

    /// Record the checksum of piece `piece_idx`, replacing any earlier one.
    pub fn record(&mut self, piece_idx: usize, checksum: Checksum) {
        if self.checksums.len() <= piece_idx {
            self.checksums.resize(piece_idx + 1, None);
        }
        self.checksums[piece_idx] = Some(checksum);
        self.touched = Instant::now();
    }

    /// Number of distinct pieces received.
    pub fn received(&self) -> usize {
        self.checksums.iter().filter(|c| c.is_some()).count()
    }

    /// Checksums in index order, provided indices `0..expected` are all
    /// present and nothing beyond them was recorded.
    pub fn ordered_checksums(&self, expected: usize) -> Result<Vec<Checksum>, SpError> {
        if self.checksums.len() > expected {
            return Err(SpError::Validation(format!(
                "received piece index {} but the stream has {expected} pieces",
                self.checksums.len() - 1
            )));
        }
        let mut out = Vec::with_capacity(expected);
        for idx in 0..expected {
            match self.checksums.get(idx).copied().flatten() {
                Some(c) => out.push(c),
                None => {
                    return Err(SpError::Validation(format!(
                        "piece {idx} missing, {} of {expected} received",
                        self.received()
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Reserve a piece write.
    pub fn begin_write(&mut self) -> Result<(), SpError> {
        if self.finalizing {
            return Err(SpError::Validation(
                "stream is being finalized, no more pieces accepted".to_string(),
            ));
        }
        self.writing += 1;
        self.touched = Instant::now();
        Ok(())
    }

    /// Release a reservation whose piece was stored.
    pub fn finish_write(&mut self, piece_idx: usize, checksum: Checksum) {
        self.writing = self.writing.saturating_sub(1);
        self.record(piece_idx, checksum);
    }

    /// Release a reservation whose piece was not stored.
    pub fn abandon_write(&mut self) {
        self.writing = self.writing.saturating_sub(1);
    }

    /// Pieces whose store write is still outstanding.
    pub fn writes_in_flight(&self) -> usize {
        self.writing
    }

    /// Enter finalize. Fails while writes are outstanding or another
    /// finalize is running.
    pub fn begin_finalize(&mut self) -> Result<(), SpError> {
        if self.finalizing {
            return Err(SpError::Validation("stream is already being finalized".to_string()));
        }
        if self.writing > 0 {
            return Err(SpError::Validation(format!(
                "{} piece writes still in flight",
                self.writing
            )));
        }
        self.finalizing = true;
        Ok(())
    }

    /// Leave finalize after it failed, reopening the stream.
    pub fn abort_finalize(&mut self) {
        self.finalizing = false;
        self.touched = Instant::now();
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    /// Nothing recorded and nothing in progress.
    pub fn is_idle(&self) -> bool {
        self.writing == 0 && !self.finalizing && self.received() == 0
    }

    /// Untouched for at least `ttl` with no write or finalize in progress.
    pub fn is_stale(&self, ttl: Duration, now: Instant) -> bool {
        self.writing == 0 && !self.finalizing && now.saturating_duration_since(self.touched) >= ttl
    }
}

/// Result of one receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A piece was stored.
    Stored,
    /// The stream was finalized.
    Finalized(IntegrityProof),
}

/// Secondary-side entry point for replicated pieces.
#[derive(Clone)]
pub struct ReceiveService {
    identity: NodeIdentity,
    consensus: Arc<dyn Consensus>,
    executor: Arc<dyn TaskExecutor>,
    policy: Arc<PolicyTable>,
    consensus_timeout: Duration,
}

impl std::fmt::Debug for ReceiveService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveService")
            .field("operator_address", self.identity.operator_address())
            .field("consensus_timeout", &self.consensus_timeout)
            .finish_non_exhaustive()
    }
}

impl ReceiveService {
    pub fn new(
        identity: NodeIdentity,
        consensus: Arc<dyn Consensus>,
        executor: Arc<dyn TaskExecutor>,
        policy: Arc<PolicyTable>,
        consensus_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            consensus,
            executor,
            policy,
            consensus_timeout,
        }
    }

    /// Check an approval presented by a pushing provider.
    ///
    /// Order matters: the approved address is compared before the signature
    /// is verified, and the expiry check is skipped (with an error log) when
    /// the chain height cannot be read.
    pub async fn validate_approval(
        &self,
        approval: &ReplicatePieceApproval,
    ) -> Result<ApprovalGrant, SpError> {
        let own = self.identity.operator_address();
        if &approval.approved_sp_operator_address != own {
            return Err(SpError::ApprovalMismatch {
                approved: approval.approved_sp_operator_address.to_string(),
                local: own.to_string(),
            });
        }

        let signature = approval.approved_signature.as_ref().ok_or_else(|| {
            SpError::SignatureInvalid("approval carries no signature".to_string())
        })?;
        self.identity
            .verify_own(&approval.signable_bytes()?, signature)
            .map_err(|e| SpError::SignatureInvalid(e.to_string()))?;

        let height = bounded(
            "current_height",
            self.consensus_timeout,
            self.consensus.current_height(),
        )
        .await;
        let checked_height = match height {
            Ok(current) => {
                if current > approval.expired_height {
                    return Err(SpError::ApprovalExpired {
                        expired_height: approval.expired_height,
                        current_height: current,
                    });
                }
                Some(current)
            }
            Err(e) => {
                tracing::error!(
                    object_id = %approval.object_info.id,
                    error = %e,
                    "failed to read block height, skipping approval expiry check"
                );
                metrics::counter!("spn_approval_height_soft_fail_total").increment(1);
                None
            }
        };

        Ok(ApprovalGrant::new(
            approval.object_info.clone(),
            approval.expired_height,
            checked_height,
        ))
    }

    /// Store one piece, or finalize the stream when `piece_idx < 0`.
    pub async fn receive_piece(
        &self,
        grant: &ApprovalGrant,
        mut receive: ReceivePieceTask,
        data: Vec<u8>,
    ) -> Result<ReceiveOutcome, SpError> {
        if receive.object_info.id != grant.object_id() {
            return Err(SpError::Validation(format!(
                "approval covers object {} but pieces were sent for object {}",
                grant.object_id(),
                receive.object_info.id
            )));
        }
        if &receive.object_info != grant.object_info() {
            tracing::warn!(
                object_id = %grant.object_id(),
                "receive message object metadata differs from the approved object"
            );
            return Err(SpError::Validation(format!(
                "object {} metadata differs from the approved object",
                grant.object_id()
            )));
        }
        if !receive.bucket_matches() {
            return Err(SpError::Validation(format!(
                "object {} is not in the bucket the receive message names",
                grant.object_id()
            )));
        }
        let streams = receive.object_info.checksums.len();
        if receive.replicate_idx as usize >= streams {
            return Err(SpError::Validation(format!(
                "replicate index {} out of range, object has {streams} streams",
                receive.replicate_idx
            )));
        }

        if receive.is_finalize() {
            receive.piece_size = 0;
            let task = Task::new(TaskPayload::ReceivePiece(receive), &self.policy);
            tracing::info!(task_key = %task.key(), "finalizing replicate stream");
            let proof = bounded(
                "done_replicate_piece",
                task.timeout(),
                self.executor.done_replicate_piece(&task),
            )
            .await?;
            return Ok(ReceiveOutcome::Finalized(proof));
        }

        receive.piece_size = data.len() as u64;
        let task = Task::new(TaskPayload::ReceivePiece(receive), &self.policy);
        tracing::debug!(task_key = %task.key(), size = data.len(), "receiving piece");
        bounded(
            "replicate_piece",
            task.timeout(),
            self.executor.replicate_piece(&task, data),
        )
        .await?;
        Ok(ReceiveOutcome::Stored)
    }
}
