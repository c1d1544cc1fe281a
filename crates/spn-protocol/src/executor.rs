//! # Local Task Executor
//!
//! Runs tasks in-process against a [`PieceStore`], an [`IntegrityStore`] and
//! the chain. It is the approver, the challenge data source and the
//! receive-side piece writer of a single node.
//!
//! Receive sessions live in a `parking_lot::Mutex` keyed by
//! `(object_id, replicate_idx)`. The lock is taken only for bookkeeping and
//! is always released before a store call is awaited. A piece write is
//! reserved in its session before the store call, so a finalize can never
//! seal a stream while one of its pieces is still being written.
//!
//! A finalized stream's session is removed. Its proof is rebuilt on demand
//! from the integrity record, which is also what rejects late pieces.
//! Sessions that stop receiving are evicted after the session TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use spn_core::{
    challenge_piece_key, ec_piece_key, ec_piece_size, segment_count, segment_piece_key,
    segment_piece_size, CanonicalBytes, Checksum, ObjectId, ObjectInfo, RedundancyType, SpError,
    StorageParams,
};
use spn_crypto::{compute_checksum, verify_integrity, IntegrityRecord, NodeIdentity};
use spn_task::{
    CreateBucketApproval, CreateObjectApproval, ReceivePieceTask, ReplicatePieceApproval, Task,
    TaskPayload,
};

use crate::collaborator::{
    ApprovalOutcome, ChallengeInfo, Consensus, IntegrityProof, IntegrityStore, PieceStore,
    TaskExecutor,
};
use crate::replication::{IntegritySignDoc, ReceiveSession};

/// Blocks an approval stays valid for by default.
pub const DEFAULT_APPROVAL_TIMEOUT_HEIGHT: u64 = 10;

/// Idle time after which an unfinished receive session is evicted.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

type SessionKey = (ObjectId, u32);

/// In-process executor for one storage-provider node.
pub struct LocalExecutor {
    identity: NodeIdentity,
    consensus: Arc<dyn Consensus>,
    pieces: Arc<dyn PieceStore>,
    integrity: Arc<dyn IntegrityStore>,
    sessions: Mutex<HashMap<SessionKey, ReceiveSession>>,
    session_ttl: Duration,
    approval_timeout_height: u64,
}

impl std::fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExecutor")
            .field("operator_address", self.identity.operator_address())
            .field("sessions", &self.session_count())
            .field("session_ttl", &self.session_ttl)
            .field("approval_timeout_height", &self.approval_timeout_height)
            .finish_non_exhaustive()
    }
}

impl LocalExecutor {
    pub fn new(
        identity: NodeIdentity,
        consensus: Arc<dyn Consensus>,
        pieces: Arc<dyn PieceStore>,
        integrity: Arc<dyn IntegrityStore>,
    ) -> Self {
        Self {
            identity,
            consensus,
            pieces,
            integrity,
            sessions: Mutex::new(HashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            approval_timeout_height: DEFAULT_APPROVAL_TIMEOUT_HEIGHT,
        }
    }

    pub fn with_approval_timeout_height(mut self, blocks: u64) -> Self {
        self.approval_timeout_height = blocks;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Open receive sessions, finalized streams excluded.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drop sessions idle for longer than the session TTL. Returns how many
    /// were dropped.
    pub fn evict_stale_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock();
        evict_stale(&mut sessions, self.session_ttl)
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Ingest an uploaded payload as this node's segment stream.
    ///
    /// Each segment is stored under its segment key and the stream's
    /// integrity record is written at redundancy index `-1`.
    pub async fn upload_object(
        &self,
        task: &Task,
        payload: &[u8],
    ) -> Result<IntegrityRecord, SpError> {
        let TaskPayload::UploadObject(upload) = task.payload() else {
            return Err(unexpected_payload("upload_object", task));
        };
        let info = &upload.object_info;
        let params = &upload.storage_params;
        params.validate()?;
        if payload.len() as u64 != info.payload_size {
            return Err(SpError::Validation(format!(
                "payload is {} bytes, object {} declares {}",
                payload.len(),
                info.id,
                info.payload_size
            )));
        }

        let chunk = usize::try_from(params.max_segment_size)
            .map_err(|_| SpError::Validation("max segment size exceeds address space".into()))?;
        let mut checksums = Vec::new();
        for (idx, segment) in payload.chunks(chunk).enumerate() {
            let segment_idx = u32::try_from(idx)
                .map_err(|_| SpError::Validation("too many segments".to_string()))?;
            checksums.push(compute_checksum(segment));
            self.pieces
                .put_piece(&segment_piece_key(info.id, segment_idx), segment.to_vec())
                .await?;
        }

        let record = IntegrityRecord::new(info.id, -1, checksums);
        self.integrity.set_integrity(record.clone()).await?;
        tracing::info!(
            task_key = %task.key(),
            segments = record.checksums.len(),
            integrity_hash = %record.integrity_hash,
            "object uploaded"
        );
        Ok(record)
    }

    async fn approval_expiry(&self) -> Result<u64, SpError> {
        let height = self.consensus.current_height().await?;
        Ok(height.saturating_add(self.approval_timeout_height))
    }

    /// Whether the stream already has an integrity record.
    async fn stream_sealed(&self, object_id: ObjectId, redundancy_idx: i32) -> Result<bool, SpError> {
        match self.integrity.get_integrity(object_id, redundancy_idx).await {
            Ok(_) => Ok(true),
            Err(SpError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Sign the integrity document for a stream. Signing is deterministic,
    /// so a stream always yields the same proof.
    fn integrity_proof(
        &self,
        object_id: ObjectId,
        replicate_idx: u32,
        integrity_hash: Checksum,
    ) -> Result<IntegrityProof, SpError> {
        let doc = IntegritySignDoc {
            operator_address: self.identity.operator_address().clone(),
            object_id,
            replicate_idx,
            integrity_hash,
        };
        Ok(IntegrityProof {
            integrity_hash,
            signature: self.identity.sign(&CanonicalBytes::new(&doc)?),
        })
    }

    /// Release a write reservation that stored nothing, dropping the
    /// session if that leaves it empty.
    fn abandon_write(&self, key: SessionKey) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&key) {
            session.abandon_write();
            if session.is_idle() {
                sessions.remove(&key);
            }
        }
    }

    /// Verify, record and sign a stream whose session is marked finalizing.
    async fn seal_stream(
        &self,
        receive: &ReceivePieceTask,
        redundancy_idx: i32,
        expected_hash: Checksum,
        checksums: Vec<Checksum>,
    ) -> Result<IntegrityProof, SpError> {
        verify_integrity(&checksums, &expected_hash)?;
        let record = IntegrityRecord::new(receive.object_info.id, redundancy_idx, checksums);
        let proof = self.integrity_proof(
            receive.object_info.id,
            receive.replicate_idx,
            record.integrity_hash,
        )?;
        self.integrity.set_integrity(record).await?;
        Ok(proof)
    }
}

fn evict_stale(sessions: &mut HashMap<SessionKey, ReceiveSession>, ttl: Duration) -> usize {
    let now = Instant::now();
    let before = sessions.len();
    sessions.retain(|(object_id, replicate_idx), session| {
        let stale = session.is_stale(ttl, now);
        if stale {
            tracing::warn!(
                %object_id,
                replicate_idx,
                received = session.received(),
                "evicting abandoned receive session"
            );
        }
        !stale
    });
    let evicted = before - sessions.len();
    if evicted > 0 {
        metrics::counter!("spn_receive_sessions_evicted_total").increment(evicted as u64);
    }
    evicted
}

fn unexpected_payload(operation: &str, task: &Task) -> SpError {
    SpError::Unsupported(format!("{operation} cannot run a {} task", task.kind()))
}

/// Length a piece of `receive` must have.
fn expected_piece_len(receive: &ReceivePieceTask, piece_idx: u32) -> Result<u64, SpError> {
    let info = &receive.object_info;
    let params = &receive.storage_params;
    match info.redundancy_type {
        RedundancyType::Replica => Ok(segment_piece_size(
            info.payload_size,
            piece_idx,
            params.max_segment_size,
        )),
        RedundancyType::Ec => ec_piece_size(
            info.payload_size,
            piece_idx,
            params.max_segment_size,
            params.redundant_data_chunk_num,
        ),
    }
}

fn redundancy_idx(replicate_idx: u32) -> Result<i32, SpError> {
    i32::try_from(replicate_idx)
        .map_err(|_| SpError::Validation(format!("replicate index {replicate_idx} too large")))
}

fn stream_len(info: &ObjectInfo, params: &StorageParams) -> Result<usize, SpError> {
    usize::try_from(segment_count(info.payload_size, params.max_segment_size))
        .map_err(|_| SpError::Validation("segment count exceeds address space".to_string()))
}

#[async_trait]
impl TaskExecutor for LocalExecutor {
    async fn ask_create_bucket_approval(
        &self,
        task: &Task,
    ) -> Result<ApprovalOutcome<CreateBucketApproval>, SpError> {
        let TaskPayload::CreateBucketApproval(msg) = task.payload() else {
            return Err(unexpected_payload("ask_create_bucket_approval", task));
        };
        if &msg.primary_sp_address != self.identity.operator_address() {
            return Ok(ApprovalOutcome::Refused(format!(
                "primary provider {} is not this node",
                msg.primary_sp_address
            )));
        }
        match self.consensus.query_bucket_info(&msg.bucket_name).await {
            Ok(_) => {
                return Ok(ApprovalOutcome::Refused(format!(
                    "bucket {} already exists",
                    msg.bucket_name
                )))
            }
            Err(SpError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let mut signed = msg.clone();
        signed.primary_sp_approval.expired_height = self.approval_expiry().await?;
        signed.primary_sp_approval.sig = Some(self.identity.sign(&signed.signable_bytes()?));
        tracing::info!(task_key = %task.key(), "approved bucket creation");
        Ok(ApprovalOutcome::Approved(signed))
    }

    async fn ask_create_object_approval(
        &self,
        task: &Task,
    ) -> Result<ApprovalOutcome<CreateObjectApproval>, SpError> {
        let TaskPayload::CreateObjectApproval(msg) = task.payload() else {
            return Err(unexpected_payload("ask_create_object_approval", task));
        };
        let bucket = match self.consensus.query_bucket_info(&msg.bucket_name).await {
            Ok(bucket) => bucket,
            Err(SpError::NotFound(_)) => {
                return Ok(ApprovalOutcome::Refused(format!(
                    "bucket {} does not exist",
                    msg.bucket_name
                )))
            }
            Err(e) => return Err(e),
        };
        if &bucket.primary_sp_address != self.identity.operator_address() {
            return Ok(ApprovalOutcome::Refused(format!(
                "bucket {} is served by {}",
                msg.bucket_name, bucket.primary_sp_address
            )));
        }

        let mut signed = msg.clone();
        signed.primary_sp_approval.expired_height = self.approval_expiry().await?;
        signed.primary_sp_approval.sig = Some(self.identity.sign(&signed.signable_bytes()?));
        tracing::info!(task_key = %task.key(), "approved object creation");
        Ok(ApprovalOutcome::Approved(signed))
    }

    async fn ask_replicate_piece_approval(
        &self,
        task: &Task,
    ) -> Result<ApprovalOutcome<ReplicatePieceApproval>, SpError> {
        let TaskPayload::ReplicatePieceApproval(msg) = task.payload() else {
            return Err(unexpected_payload("ask_replicate_piece_approval", task));
        };
        if msg.object_info.checksums.is_empty() {
            return Ok(ApprovalOutcome::Refused(format!(
                "object {} has no stream checksums",
                msg.object_info.id
            )));
        }

        let mut signed = msg.clone();
        signed.approved_sp_operator_address = self.identity.operator_address().clone();
        signed.approved_sp_endpoint = self.identity.endpoint().to_string();
        signed.expired_height = self.approval_expiry().await?;
        signed.approved_signature = Some(self.identity.sign(&signed.signable_bytes()?));
        tracing::info!(task_key = %task.key(), "approved piece replication");
        Ok(ApprovalOutcome::Approved(signed))
    }

    async fn get_challenge_info(&self, task: &Task) -> Result<ChallengeInfo, SpError> {
        let TaskPayload::ChallengePiece(challenge) = task.payload() else {
            return Err(unexpected_payload("get_challenge_info", task));
        };
        let id = challenge.object_info.id;
        let record = self
            .integrity
            .get_integrity(id, challenge.redundancy_idx)
            .await?;
        let key = challenge_piece_key(id, challenge.segment_idx, challenge.redundancy_idx);
        let data = self.pieces.get_piece(&key).await?;
        if data.len() as u64 != challenge.piece_size {
            tracing::error!(
                piece_key = %key,
                stored = data.len(),
                expected = challenge.piece_size,
                "stored piece length does not match its computed size"
            );
            return Err(SpError::Internal(format!(
                "piece {key} is {} bytes, expected {}",
                data.len(),
                challenge.piece_size
            )));
        }
        Ok(ChallengeInfo {
            integrity_hash: record.integrity_hash,
            checksums: record.checksums,
            data,
        })
    }

    async fn replicate_piece(&self, task: &Task, data: Vec<u8>) -> Result<(), SpError> {
        let TaskPayload::ReceivePiece(receive) = task.payload() else {
            return Err(unexpected_payload("replicate_piece", task));
        };
        let info = &receive.object_info;
        let session_key = (info.id, receive.replicate_idx);
        let piece_idx = u32::try_from(receive.piece_idx).map_err(|_| {
            SpError::Validation(format!("piece index {} is negative", receive.piece_idx))
        })?;
        receive.storage_params.validate()?;

        let pieces = stream_len(info, &receive.storage_params)?;
        if piece_idx as usize >= pieces {
            return Err(SpError::Validation(format!(
                "piece index {piece_idx} out of range, object has {pieces} segments"
            )));
        }
        let expected = expected_piece_len(receive, piece_idx)?;
        if data.len() as u64 != expected {
            return Err(SpError::Validation(format!(
                "piece {piece_idx} is {} bytes, expected {expected}",
                data.len()
            )));
        }
        let checksum = compute_checksum(&data);
        if let Some(declared) = &receive.piece_checksum {
            if declared != &checksum {
                return Err(SpError::Validation(format!(
                    "piece {piece_idx} checksum {checksum} does not match declared {declared}"
                )));
            }
        }

        let redundancy_idx = redundancy_idx(receive.replicate_idx)?;

        {
            let mut sessions = self.sessions.lock();
            if !sessions.contains_key(&session_key) {
                evict_stale(&mut sessions, self.session_ttl);
            }
            sessions.entry(session_key).or_default().begin_write()?;
        }
        // Checked after reserving: a finalize that completed before the
        // reservation has already written its record.
        match self.stream_sealed(info.id, redundancy_idx).await {
            Ok(false) => {}
            Ok(true) => {
                self.abandon_write(session_key);
                return Err(SpError::Validation(format!(
                    "stream {} of object {} is already finalized",
                    receive.replicate_idx, info.id
                )));
            }
            Err(e) => {
                self.abandon_write(session_key);
                return Err(e);
            }
        }

        let key = ec_piece_key(info.id, piece_idx, receive.replicate_idx);
        if let Err(e) = self.pieces.put_piece(&key, data).await {
            self.abandon_write(session_key);
            return Err(e);
        }

        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&session_key) {
            Some(session) => session.finish_write(piece_idx as usize, checksum),
            None => {
                return Err(SpError::Internal(format!(
                    "receive session for stream {} of object {} vanished during a write",
                    receive.replicate_idx, info.id
                )))
            }
        }
        metrics::counter!("spn_pieces_received_total").increment(1);
        Ok(())
    }

    async fn done_replicate_piece(&self, task: &Task) -> Result<IntegrityProof, SpError> {
        let TaskPayload::ReceivePiece(receive) = task.payload() else {
            return Err(unexpected_payload("done_replicate_piece", task));
        };
        let info = &receive.object_info;
        let session_key = (info.id, receive.replicate_idx);
        let expected_hash = info
            .expected_checksum(receive.replicate_idx)
            .copied()
            .ok_or_else(|| {
                SpError::Validation(format!(
                    "replicate index {} out of range",
                    receive.replicate_idx
                ))
            })?;
        let pieces = stream_len(info, &receive.storage_params)?;
        let redundancy_idx = redundancy_idx(receive.replicate_idx)?;

        let claimed = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(&session_key) {
                None => None,
                Some(session) => {
                    if session.received() == 0 {
                        return Err(SpError::Validation("cannot finalize an empty stream".into()));
                    }
                    let checksums = session.ordered_checksums(pieces)?;
                    session.begin_finalize()?;
                    Some(checksums)
                }
            }
        };

        let Some(checksums) = claimed else {
            // Already finalized, or nothing was ever received.
            let record = match self.integrity.get_integrity(info.id, redundancy_idx).await {
                Ok(record) => record,
                Err(SpError::NotFound(_)) => {
                    return Err(SpError::Validation(format!(
                        "no pieces received for stream {} of object {}",
                        receive.replicate_idx, info.id
                    )))
                }
                Err(e) => return Err(e),
            };
            if record.integrity_hash != expected_hash {
                return Err(SpError::Validation(format!(
                    "stream {} of object {} was sealed with {}, object expects {expected_hash}",
                    receive.replicate_idx, info.id, record.integrity_hash
                )));
            }
            tracing::debug!(task_key = %task.key(), "replaying integrity proof of sealed stream");
            return self.integrity_proof(info.id, receive.replicate_idx, record.integrity_hash);
        };

        let sealed = self
            .seal_stream(receive, redundancy_idx, expected_hash, checksums)
            .await;
        let mut sessions = self.sessions.lock();
        match &sealed {
            Ok(proof) => {
                sessions.remove(&session_key);
                tracing::info!(
                    task_key = %task.key(),
                    integrity_hash = %proof.integrity_hash,
                    "replicate stream finalized"
                );
            }
            Err(_) => {
                if let Some(session) = sessions.get_mut(&session_key) {
                    session.abort_finalize();
                }
            }
        }
        sealed
    }
}
