//! End-to-end protocol tests: approval validation order, the receive state
//! machine, challenge piece selection and approval signing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use spn_core::{
    BucketInfo, CanonicalBytes, Checksum, ErrorKind, ObjectId, ObjectInfo, ObjectStatus,
    OperatorAddress, RedundancyType, SpError, StorageParams,
};
use spn_crypto::{compute_checksum, compute_integrity_hash, Ed25519KeyPair, NodeIdentity};
use spn_protocol::{
    ApprovalOutcome, ApprovalService, AuthOp, ChallengeInfo, ChallengeService, Consensus,
    IntegrityProof, IntegritySignDoc, LocalExecutor, MemoryAuthorizer, MemoryChain,
    MemoryIntegrityStore, MemoryPieceStore, PieceStore, ReceiveOutcome, ReceiveService,
    TaskExecutor, DEFAULT_SESSION_TTL,
};
use spn_task::{
    CreateBucketApproval, CreateObjectApproval, PolicyTable, PrimarySpApproval, ReceivePieceTask,
    ReplicatePieceApproval, Task, TaskPayload, Visibility,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const OBJECT: ObjectId = ObjectId(7);
const TIMEOUT: Duration = Duration::from_secs(2);

fn addr(b: u8) -> OperatorAddress {
    OperatorAddress::from_bytes(&[b; 20])
}

fn params() -> StorageParams {
    StorageParams {
        max_segment_size: 400,
        redundant_data_chunk_num: 4,
        redundant_parity_chunk_num: 2,
        max_payload_size: 1 << 30,
    }
}

/// EC pieces of stream 1 for a 1000-byte payload: 100, 100 and 50 bytes.
fn stream_pieces() -> Vec<Vec<u8>> {
    vec![vec![1; 100], vec![2; 100], vec![3; 50]]
}

fn stream_hash() -> Checksum {
    let checksums: Vec<_> = stream_pieces().iter().map(|p| compute_checksum(p)).collect();
    compute_integrity_hash(&checksums)
}

fn object() -> ObjectInfo {
    ObjectInfo {
        id: OBJECT,
        bucket_name: "photos".into(),
        object_name: "cat.png".into(),
        owner: addr(1),
        payload_size: 1000,
        redundancy_type: RedundancyType::Ec,
        checksums: vec![Checksum::from_bytes([0; 32]), stream_hash()],
        create_at: 100,
        status: ObjectStatus::Created,
    }
}

struct Node {
    identity: NodeIdentity,
    chain: MemoryChain,
    authorizer: MemoryAuthorizer,
    pieces: MemoryPieceStore,
    executor: Arc<LocalExecutor>,
    receive: ReceiveService,
    challenge: ChallengeService,
    approvals: ApprovalService,
}

/// Piece store that sleeps before every write.
struct SlowPieceStore {
    inner: MemoryPieceStore,
    delay: Duration,
}

#[async_trait]
impl PieceStore for SlowPieceStore {
    async fn put_piece(&self, key: &str, data: Vec<u8>) -> Result<(), SpError> {
        tokio::time::sleep(self.delay).await;
        self.inner.put_piece(key, data).await
    }

    async fn get_piece(&self, key: &str) -> Result<Vec<u8>, SpError> {
        self.inner.get_piece(key).await
    }

    async fn delete_piece(&self, key: &str) -> Result<(), SpError> {
        self.inner.delete_piece(key).await
    }
}

fn node() -> Node {
    node_with(None, DEFAULT_SESSION_TTL)
}

fn node_with(write_delay: Option<Duration>, session_ttl: Duration) -> Node {
    let identity = NodeIdentity::new(Ed25519KeyPair::from_seed(&[5; 32]), "http://secondary");
    let chain = MemoryChain::new();
    chain.set_height(100);
    chain.set_storage_params(0, params());
    chain.insert_object(object());
    chain.insert_bucket(BucketInfo {
        id: 1,
        bucket_name: "photos".into(),
        owner: addr(1),
        primary_sp_address: identity.operator_address().clone(),
    });
    let authorizer = MemoryAuthorizer::allow_all();
    let pieces = MemoryPieceStore::new();
    let store: Arc<dyn PieceStore> = match write_delay {
        Some(delay) => Arc::new(SlowPieceStore {
            inner: pieces.clone(),
            delay,
        }),
        None => Arc::new(pieces.clone()),
    };
    let local = Arc::new(
        LocalExecutor::new(
            identity.clone(),
            Arc::new(chain.clone()),
            store,
            Arc::new(MemoryIntegrityStore::new()),
        )
        .with_session_ttl(session_ttl),
    );
    let executor: Arc<dyn TaskExecutor> = local.clone();
    let policy = Arc::new(PolicyTable::default());
    Node {
        receive: ReceiveService::new(
            identity.clone(),
            Arc::new(chain.clone()),
            executor.clone(),
            policy.clone(),
            TIMEOUT,
        ),
        challenge: ChallengeService::new(
            Arc::new(authorizer.clone()),
            Arc::new(chain.clone()),
            executor.clone(),
            policy.clone(),
            TIMEOUT,
        ),
        approvals: ApprovalService::new(
            identity.clone(),
            Arc::new(authorizer.clone()),
            executor,
            policy,
            TIMEOUT,
        ),
        identity,
        chain,
        authorizer,
        pieces,
        executor: local,
    }
}

fn signed_approval(identity: &NodeIdentity, approved: OperatorAddress, expired_height: u64) -> ReplicatePieceApproval {
    let mut approval = ReplicatePieceApproval {
        object_info: object(),
        ask_sp_operator_address: addr(9),
        approved_sp_operator_address: approved,
        approved_sp_endpoint: "http://secondary".into(),
        expired_height,
        create_time: 1_700_000_000,
        approved_signature: None,
    };
    approval.approved_signature = Some(identity.sign(&approval.signable_bytes().unwrap()));
    approval
}

fn receive_msg(piece_idx: i32) -> ReceivePieceTask {
    ReceivePieceTask {
        object_info: object(),
        bucket_info: None,
        storage_params: params(),
        replicate_idx: 1,
        piece_idx,
        piece_size: 0,
        piece_checksum: None,
    }
}

// ---------------------------------------------------------------------------
// Approval validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mismatched_provider_is_reported_before_signature() {
    let n = node();
    let mut approval = signed_approval(&n.identity, addr(4), 200);
    approval.approved_signature = None;
    let err = n.receive.validate_approval(&approval).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApprovalMismatch);
}

#[tokio::test]
async fn foreign_signature_is_rejected() {
    let n = node();
    let other = NodeIdentity::new(Ed25519KeyPair::from_seed(&[6; 32]), "http://other");
    let approval = signed_approval(&other, n.identity.operator_address().clone(), 200);
    let err = n.receive.validate_approval(&approval).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
}

#[tokio::test]
async fn tampered_approval_is_rejected() {
    let n = node();
    let mut approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    approval.expired_height = 10_000;
    let err = n.receive.validate_approval(&approval).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
}

#[tokio::test]
async fn approval_valid_through_its_expiry_height() {
    let n = node();
    let own = n.identity.operator_address().clone();
    let approval = signed_approval(&n.identity, own.clone(), 100);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    assert_eq!(grant.checked_height(), Some(100));

    n.chain.set_height(101);
    let err = n.receive.validate_approval(&approval).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApprovalExpired);
}

#[tokio::test]
async fn height_failure_skips_expiry_check() {
    let n = node();
    n.chain.set_height(500);
    n.chain.set_height_unavailable(true);
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 100);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    assert_eq!(grant.checked_height(), None);
    assert_eq!(grant.object_id(), OBJECT);
}

// ---------------------------------------------------------------------------
// Receive and finalize
// ---------------------------------------------------------------------------

async fn push_all(n: &Node) -> IntegrityProof {
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    for (idx, piece) in stream_pieces().into_iter().enumerate() {
        let outcome = n
            .receive
            .receive_piece(&grant, receive_msg(idx as i32), piece)
            .await
            .unwrap();
        assert_eq!(outcome, ReceiveOutcome::Stored);
    }
    match n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap()
    {
        ReceiveOutcome::Finalized(proof) => proof,
        ReceiveOutcome::Stored => panic!("finalize stored a piece"),
    }
}

#[tokio::test]
async fn full_stream_finalizes_with_signed_proof() {
    let n = node();
    let proof = push_all(&n).await;
    assert_eq!(proof.integrity_hash, stream_hash());
    assert_eq!(n.pieces.len(), 3);
    assert!(n.pieces.contains("7_s2_p1"));

    let doc = IntegritySignDoc {
        operator_address: n.identity.operator_address().clone(),
        object_id: OBJECT,
        replicate_idx: 1,
        integrity_hash: proof.integrity_hash,
    };
    n.identity
        .verify_own(&CanonicalBytes::new(&doc).unwrap(), &proof.signature)
        .unwrap();
}

#[tokio::test]
async fn pieces_may_arrive_out_of_order_and_be_resent() {
    let n = node();
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    let pieces = stream_pieces();
    for idx in [2usize, 0, 1, 1] {
        n.receive
            .receive_piece(&grant, receive_msg(idx as i32), pieces[idx].clone())
            .await
            .unwrap();
    }
    let outcome = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap();
    assert!(matches!(outcome, ReceiveOutcome::Finalized(p) if p.integrity_hash == stream_hash()));
}

#[tokio::test]
async fn finalize_twice_returns_the_same_proof() {
    let n = node();
    let first = push_all(&n).await;
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    let again = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap();
    assert_eq!(again, ReceiveOutcome::Finalized(first));
}

#[tokio::test]
async fn receive_after_finalize_is_rejected() {
    let n = node();
    push_all(&n).await;
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(0), vec![9; 100])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(n.pieces.get_piece("7_s0_p1").await.unwrap(), vec![1; 100]);
    assert_eq!(n.executor.session_count(), 0);
}

#[tokio::test]
async fn finalize_is_refused_while_a_resend_is_being_written() {
    let n = node_with(Some(Duration::from_millis(200)), DEFAULT_SESSION_TTL);
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    for (idx, piece) in stream_pieces().into_iter().enumerate() {
        n.receive
            .receive_piece(&grant, receive_msg(idx as i32), piece)
            .await
            .unwrap();
    }

    let receive = n.receive.clone();
    let resend_grant = grant.clone();
    let resend = tokio::spawn(async move {
        receive
            .receive_piece(&resend_grant, receive_msg(0), vec![9; 100])
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(resend.await.unwrap().unwrap(), ReceiveOutcome::Stored);

    // The resent bytes no longer match the approved stream.
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    n.receive
        .receive_piece(&grant, receive_msg(0), vec![1; 100])
        .await
        .unwrap();
    let outcome = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap();
    assert!(matches!(outcome, ReceiveOutcome::Finalized(p) if p.integrity_hash == stream_hash()));

    let info = n.challenge.challenge(&addr(3), OBJECT, 1, 0).await.unwrap();
    assert_eq!(info.data, vec![1; 100]);
    assert_eq!(info.checksums[0], compute_checksum(&info.data));
}

#[tokio::test]
async fn finalized_stream_releases_its_session() {
    let n = node();
    let first = push_all(&n).await;
    assert_eq!(n.executor.session_count(), 0);

    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    let again = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap();
    assert_eq!(again, ReceiveOutcome::Finalized(first));
    assert_eq!(n.executor.session_count(), 0);
}

#[tokio::test]
async fn abandoned_sessions_are_evicted() {
    let n = node_with(None, Duration::from_millis(50));
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    n.receive
        .receive_piece(&grant, receive_msg(0), vec![1; 100])
        .await
        .unwrap();
    assert_eq!(n.executor.session_count(), 1);
    assert_eq!(n.executor.evict_stale_sessions(), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(n.executor.evict_stale_sessions(), 1);
    assert_eq!(n.executor.session_count(), 0);

    // Opening a new stream sweeps idle ones too.
    n.receive
        .receive_piece(&grant, receive_msg(1), vec![2; 100])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut msg = receive_msg(0);
    msg.replicate_idx = 0;
    n.receive
        .receive_piece(&grant, msg, vec![1; 100])
        .await
        .unwrap();
    assert_eq!(n.executor.session_count(), 1);

    // An evicted stream cannot be finalized.
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn pieces_must_describe_the_approved_object() {
    let n = node();
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    assert_eq!(grant.object_info(), &object());

    let garbage = vec![vec![0xEE; 100], vec![0xEE; 100], vec![0xEE; 50]];
    let garbage_hash = compute_integrity_hash(
        &garbage.iter().map(|p| compute_checksum(p)).collect::<Vec<_>>(),
    );
    let forged = |piece_idx: i32| {
        let mut msg = receive_msg(piece_idx);
        msg.object_info.checksums[1] = garbage_hash;
        msg
    };
    for (idx, piece) in garbage.into_iter().enumerate() {
        let err = n
            .receive
            .receive_piece(&grant, forged(idx as i32), piece)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }
    let err = n
        .receive
        .receive_piece(&grant, forged(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let mut resized = receive_msg(0);
    resized.object_info.payload_size = 100;
    let err = n
        .receive
        .receive_piece(&grant, resized, vec![1; 25])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    assert!(n.pieces.is_empty());
    assert_eq!(n.executor.session_count(), 0);
}

#[tokio::test]
async fn finalize_with_zero_pieces_is_rejected() {
    let n = node();
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn incomplete_stream_does_not_finalize() {
    let n = node();
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    n.receive
        .receive_piece(&grant, receive_msg(0), vec![1; 100])
        .await
        .unwrap();
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn corrupted_stream_fails_integrity_check() {
    let n = node();
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    let mut pieces = stream_pieces();
    pieces[1] = vec![9; 100];
    for (idx, piece) in pieces.into_iter().enumerate() {
        n.receive
            .receive_piece(&grant, receive_msg(idx as i32), piece)
            .await
            .unwrap();
    }
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(-1), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn piece_checks() {
    let n = node();
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 200);
    let grant = n.receive.validate_approval(&approval).await.unwrap();

    // wrong length
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(0), vec![1; 99])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    // past the last segment
    let err = n
        .receive
        .receive_piece(&grant, receive_msg(3), vec![1; 50])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    // declared checksum disagrees with the data
    let mut msg = receive_msg(0);
    msg.piece_checksum = Some(compute_checksum(b"other"));
    let err = n
        .receive
        .receive_piece(&grant, msg, vec![1; 100])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    // replicate index beyond the object's streams
    let mut msg = receive_msg(0);
    msg.replicate_idx = 2;
    let err = n
        .receive
        .receive_piece(&grant, msg, vec![1; 100])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    // bucket descriptor for another bucket
    let mut msg = receive_msg(0);
    msg.bucket_info = Some(BucketInfo {
        id: 2,
        bucket_name: "videos".into(),
        owner: addr(1),
        primary_sp_address: addr(9),
    });
    let err = n
        .receive
        .receive_piece(&grant, msg, vec![1; 100])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    // pieces for a different object than the approval covers
    let mut msg = receive_msg(0);
    msg.object_info.id = ObjectId(8);
    let err = n
        .receive
        .receive_piece(&grant, msg, vec![1; 100])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    assert!(n.pieces.is_empty());
}

#[tokio::test]
async fn replicate_approval_from_service_is_accepted() {
    let n = node();
    let approval = n
        .approvals
        .ask_replicate_piece_approval(addr(9), object())
        .await
        .unwrap();
    assert_eq!(&approval.approved_sp_operator_address, n.identity.operator_address());
    assert_eq!(approval.approved_sp_endpoint, "http://secondary");
    assert_eq!(approval.expired_height, 110);
    let grant = n.receive.validate_approval(&approval).await.unwrap();
    assert_eq!(grant.expired_height(), 110);
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn challenge_reads_back_received_piece() {
    let n = node();
    push_all(&n).await;
    let info = n.challenge.challenge(&addr(3), OBJECT, 1, 2).await.unwrap();
    assert_eq!(info.data, vec![3; 50]);
    assert_eq!(info.integrity_hash, stream_hash());
    assert_eq!(info.checksums.len(), 3);
    assert_eq!(info.checksums[2], compute_checksum(&[3; 50]));
}

#[tokio::test]
async fn challenge_for_unknown_object_is_not_found() {
    let n = node();
    let err = n.challenge.challenge(&addr(3), ObjectId(99), 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn challenge_without_stored_stream_is_not_found() {
    let n = node();
    let err = n.challenge.challenge(&addr(3), OBJECT, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn challenge_with_chain_down_is_unavailable() {
    let n = node();
    n.chain.set_unavailable(true);
    let err = n.challenge.challenge(&addr(3), OBJECT, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsensusUnavailable);
    assert!(err.is_retryable());
}

/// Records the challenge tasks it is handed and answers with fixed data.
#[derive(Default)]
struct StubExecutor {
    challenges: Mutex<Vec<Task>>,
    delay: Option<Duration>,
}

#[async_trait]
impl TaskExecutor for StubExecutor {
    async fn ask_create_bucket_approval(
        &self,
        _task: &Task,
    ) -> Result<ApprovalOutcome<CreateBucketApproval>, SpError> {
        Ok(ApprovalOutcome::Refused("stub never approves".into()))
    }

    async fn ask_create_object_approval(
        &self,
        _task: &Task,
    ) -> Result<ApprovalOutcome<CreateObjectApproval>, SpError> {
        Ok(ApprovalOutcome::Refused("stub never approves".into()))
    }

    async fn ask_replicate_piece_approval(
        &self,
        _task: &Task,
    ) -> Result<ApprovalOutcome<ReplicatePieceApproval>, SpError> {
        Ok(ApprovalOutcome::Refused("stub never approves".into()))
    }

    async fn get_challenge_info(&self, task: &Task) -> Result<ChallengeInfo, SpError> {
        self.challenges.lock().push(task.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ChallengeInfo {
            integrity_hash: Checksum::from_bytes([1; 32]),
            checksums: vec![Checksum::from_bytes([2; 32])],
            data: b"piece".to_vec(),
        })
    }

    async fn replicate_piece(&self, _task: &Task, _data: Vec<u8>) -> Result<(), SpError> {
        Err(SpError::Unsupported("stub".into()))
    }

    async fn done_replicate_piece(&self, _task: &Task) -> Result<IntegrityProof, SpError> {
        Err(SpError::Unsupported("stub".into()))
    }
}

fn stub_challenge(n: &Node, stub: Arc<StubExecutor>, consensus: Arc<dyn Consensus>) -> ChallengeService {
    ChallengeService::new(
        Arc::new(n.authorizer.clone()),
        consensus,
        stub,
        Arc::new(PolicyTable::default()),
        TIMEOUT,
    )
}

fn challenged(stub: &StubExecutor) -> (i32, u32, u64) {
    let tasks = stub.challenges.lock();
    let TaskPayload::ChallengePiece(t) = tasks[tasks.len() - 1].payload() else {
        panic!("not a challenge task");
    };
    (t.redundancy_idx, t.segment_idx, t.piece_size)
}

#[tokio::test]
async fn challenge_selects_piece_size_by_redundancy_index() {
    let n = node();
    let stub = Arc::new(StubExecutor::default());
    let svc = stub_challenge(&n, stub.clone(), Arc::new(n.chain.clone()));

    let info = svc.challenge(&addr(3), OBJECT, -1, 2).await.unwrap();
    assert_eq!(info.data, b"piece");
    assert_eq!(challenged(&stub), (-1, 2, 200));

    svc.challenge(&addr(3), OBJECT, 0, 0).await.unwrap();
    assert_eq!(challenged(&stub), (0, 0, 100));

    svc.challenge(&addr(3), OBJECT, 4, 2).await.unwrap();
    assert_eq!(challenged(&stub), (4, 2, 50));
}

#[tokio::test]
async fn challenge_task_key_names_requester_and_indices() {
    let n = node();
    let stub = Arc::new(StubExecutor::default());
    let svc = stub_challenge(&n, stub.clone(), Arc::new(n.chain.clone()));
    svc.challenge(&addr(3), OBJECT, 1, 0).await.unwrap();
    let key = stub.challenges.lock()[0].key();
    assert_eq!(
        key.as_str(),
        format!("ChallengePiece-photos-cat.png-7-sIdx:0-rIdx:1-{}", addr(3))
    );
}

#[tokio::test]
async fn refused_challenge_never_reaches_executor() {
    let n = node();
    n.authorizer.deny(AuthOp::GetChallengePieceInfo, addr(3));
    let stub = Arc::new(StubExecutor::default());
    let svc = stub_challenge(&n, stub.clone(), Arc::new(n.chain.clone()));
    let err = svc.challenge(&addr(3), OBJECT, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(stub.challenges.lock().is_empty());
}

/// Chain whose object lookups never answer in time.
struct SlowChain(MemoryChain);

#[async_trait]
impl Consensus for SlowChain {
    async fn query_object_info(&self, id: ObjectId) -> Result<ObjectInfo, SpError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.0.query_object_info(id).await
    }

    async fn query_bucket_info(&self, bucket_name: &str) -> Result<BucketInfo, SpError> {
        self.0.query_bucket_info(bucket_name).await
    }

    async fn query_storage_params(&self, timestamp: i64) -> Result<StorageParams, SpError> {
        self.0.query_storage_params(timestamp).await
    }

    async fn current_height(&self) -> Result<u64, SpError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.0.current_height().await
    }
}

#[tokio::test]
async fn slow_chain_times_out() {
    let n = node();
    let stub = Arc::new(StubExecutor::default());
    let svc = ChallengeService::new(
        Arc::new(n.authorizer.clone()),
        Arc::new(SlowChain(n.chain.clone())),
        stub.clone(),
        Arc::new(PolicyTable::default()),
        Duration::from_millis(20),
    );
    let err = svc.challenge(&addr(3), OBJECT, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(stub.challenges.lock().is_empty());
}

#[tokio::test]
async fn slow_height_query_is_a_soft_failure() {
    let n = node();
    let receive = ReceiveService::new(
        n.identity.clone(),
        Arc::new(SlowChain(n.chain.clone())),
        Arc::new(StubExecutor::default()),
        Arc::new(PolicyTable::default()),
        Duration::from_millis(20),
    );
    let approval = signed_approval(&n.identity, n.identity.operator_address().clone(), 1);
    let grant = receive.validate_approval(&approval).await.unwrap();
    assert_eq!(grant.checked_height(), None);
}

// ---------------------------------------------------------------------------
// Approvals
// ---------------------------------------------------------------------------

fn bucket_msg(n: &Node, name: &str) -> CreateBucketApproval {
    CreateBucketApproval {
        creator: addr(1),
        bucket_name: name.into(),
        visibility: Visibility::PublicRead,
        payment_address: addr(1),
        primary_sp_address: n.identity.operator_address().clone(),
        primary_sp_approval: PrimarySpApproval::default(),
        charged_read_quota: 0,
    }
}

#[tokio::test]
async fn bucket_approval_round_trip() {
    let n = node();
    let msg = serde_json::to_vec(&bucket_msg(&n, "videos")).unwrap();
    let signed_bytes = n
        .approvals
        .ask_approval(&addr(1), "CreateBucket", &msg)
        .await
        .unwrap();
    let signed: CreateBucketApproval = serde_json::from_slice(&signed_bytes).unwrap();
    assert_eq!(
        signed_bytes,
        CanonicalBytes::new(&signed).unwrap().into_vec(),
        "signed message is returned in canonical form"
    );
    assert_eq!(signed.primary_sp_approval.expired_height, 110);
    let sig = signed.primary_sp_approval.sig.clone().unwrap();
    n.identity
        .verify_own(&signed.signable_bytes().unwrap(), &sig)
        .unwrap();
}

#[tokio::test]
async fn object_approval_round_trip() {
    let n = node();
    let msg = CreateObjectApproval {
        creator: addr(1),
        bucket_name: "photos".into(),
        object_name: "dog.png".into(),
        payload_size: 1000,
        visibility: Visibility::Inherit,
        content_type: "image/png".into(),
        primary_sp_approval: PrimarySpApproval::default(),
        expect_checksums: vec![compute_checksum(b"x")],
        redundancy_type: RedundancyType::Ec,
    };
    let bytes = n
        .approvals
        .ask_approval(&addr(1), "CreateObject", &serde_json::to_vec(&msg).unwrap())
        .await
        .unwrap();
    let signed: CreateObjectApproval = serde_json::from_slice(&bytes).unwrap();
    assert!(signed.primary_sp_approval.sig.is_some());
    assert_eq!(signed.object_name, "dog.png");
}

#[tokio::test]
async fn approval_failures_in_order() {
    let n = node();

    let err = n
        .approvals
        .ask_approval(&addr(1), "DeleteBucket", b"not json")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedRequest);

    let err = n
        .approvals
        .ask_approval(&addr(1), "CreateBucket", b"not json")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);

    let bad_name = serde_json::to_vec(&bucket_msg(&n, "-x")).unwrap();
    let err = n
        .approvals
        .ask_approval(&addr(1), "CreateBucket", &bad_name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    n.authorizer.deny(AuthOp::AskCreateBucketApproval, addr(2));
    let msg = serde_json::to_vec(&bucket_msg(&n, "videos")).unwrap();
    let err = n
        .approvals
        .ask_approval(&addr(2), "CreateBucket", &msg)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // already on chain
    let msg = serde_json::to_vec(&bucket_msg(&n, "photos")).unwrap();
    let err = n
        .approvals
        .ask_approval(&addr(1), "CreateBucket", &msg)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApprovalRefused);
}

#[tokio::test]
async fn refusing_executor_is_approval_refused() {
    let n = node();
    let svc = ApprovalService::new(
        n.identity.clone(),
        Arc::new(n.authorizer.clone()),
        Arc::new(StubExecutor::default()),
        Arc::new(PolicyTable::default()),
        TIMEOUT,
    );
    let msg = serde_json::to_vec(&bucket_msg(&n, "videos")).unwrap();
    let err = svc
        .ask_approval(&addr(1), "CreateBucket", &msg)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApprovalRefused);
    let err = svc
        .ask_replicate_piece_approval(addr(9), object())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApprovalRefused);
}

#[tokio::test]
async fn slow_executor_times_out_under_task_policy() {
    let n = node();
    let policy = PolicyTable::default()
        .merge_yaml("ChallengePiece:\n  min_timeout_secs: 0\n  max_timeout_secs: 0\n")
        .unwrap();
    let stub = Arc::new(StubExecutor {
        delay: Some(Duration::from_secs(30)),
        ..StubExecutor::default()
    });
    let svc = ChallengeService::new(
        Arc::new(n.authorizer.clone()),
        Arc::new(n.chain.clone()),
        stub,
        Arc::new(policy),
        TIMEOUT,
    );
    let err = svc.challenge(&addr(3), OBJECT, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}
