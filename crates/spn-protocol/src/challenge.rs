//! # Challenge Protocol
//!
//! A validator asks for one stored piece of an object together with the
//! integrity hash and piece checksums of its stream, so it can check the
//! piece against what was sealed on chain.
//!
//! Authorization is checked right after the object lookup and before any
//! bucket, parameter or piece data is read.

use std::sync::Arc;
use std::time::Duration;

use spn_core::{
    ec_piece_size, segment_piece_size, ObjectId, ObjectInfo, OperatorAddress, RedundancyType,
    SpError, StorageParams,
};
use spn_task::{ChallengePieceTask, PolicyTable, Task, TaskPayload};

use crate::collaborator::{AuthOp, Authorizer, ChallengeInfo, Consensus, TaskExecutor};
use crate::deadline::bounded;

/// Size of the piece a challenge selects.
///
/// A negative `redundancy_idx` selects the segment stream. Replica objects
/// keep whole segments in every stream, so they also use the segment size.
pub fn challenge_piece_size(
    object: &ObjectInfo,
    params: &StorageParams,
    redundancy_idx: i32,
    segment_idx: u32,
) -> Result<u64, SpError> {
    if redundancy_idx < 0 || object.redundancy_type == RedundancyType::Replica {
        Ok(segment_piece_size(
            object.payload_size,
            segment_idx,
            params.max_segment_size,
        ))
    } else {
        ec_piece_size(
            object.payload_size,
            segment_idx,
            params.max_segment_size,
            params.redundant_data_chunk_num,
        )
    }
}

#[derive(Clone)]
pub struct ChallengeService {
    authorizer: Arc<dyn Authorizer>,
    consensus: Arc<dyn Consensus>,
    executor: Arc<dyn TaskExecutor>,
    policy: Arc<PolicyTable>,
    consensus_timeout: Duration,
}

impl std::fmt::Debug for ChallengeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeService")
            .field("consensus_timeout", &self.consensus_timeout)
            .finish_non_exhaustive()
    }
}

impl ChallengeService {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        consensus: Arc<dyn Consensus>,
        executor: Arc<dyn TaskExecutor>,
        policy: Arc<PolicyTable>,
        consensus_timeout: Duration,
    ) -> Self {
        Self {
            authorizer,
            consensus,
            executor,
            policy,
            consensus_timeout,
        }
    }

    pub async fn challenge(
        &self,
        requester: &OperatorAddress,
        object_id: ObjectId,
        redundancy_idx: i32,
        segment_idx: u32,
    ) -> Result<ChallengeInfo, SpError> {
        let object_info = bounded(
            "query_object_info",
            self.consensus_timeout,
            self.consensus.query_object_info(object_id),
        )
        .await?;

        let allowed = bounded(
            "verify_authorize",
            self.consensus_timeout,
            self.authorizer.verify_authorize(
                AuthOp::GetChallengePieceInfo,
                requester,
                &object_info.bucket_name,
                &object_info.object_name,
            ),
        )
        .await?;
        if !allowed {
            return Err(SpError::PermissionDenied(format!(
                "{requester} may not challenge object {object_id}"
            )));
        }

        let bucket_info = bounded(
            "query_bucket_info",
            self.consensus_timeout,
            self.consensus.query_bucket_info(&object_info.bucket_name),
        )
        .await?;
        let storage_params = bounded(
            "query_storage_params",
            self.consensus_timeout,
            self.consensus.query_storage_params(object_info.create_at),
        )
        .await?;
        storage_params.validate()?;
        let piece_size =
            challenge_piece_size(&object_info, &storage_params, redundancy_idx, segment_idx)?;

        let task = Task::new(
            TaskPayload::ChallengePiece(ChallengePieceTask {
                object_info,
                bucket_info,
                storage_params,
                user_address: requester.clone(),
                redundancy_idx,
                segment_idx,
                piece_size,
            }),
            &self.policy,
        );
        tracing::info!(task_key = %task.key(), piece_size, "serving challenge");
        bounded(
            "get_challenge_info",
            task.timeout(),
            self.executor.get_challenge_info(&task),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spn_core::{Checksum, ObjectStatus};

    fn object(payload_size: u64, redundancy_type: RedundancyType) -> ObjectInfo {
        ObjectInfo {
            id: ObjectId(1),
            bucket_name: "b".into(),
            object_name: "o".into(),
            owner: OperatorAddress::from_bytes(&[1; 20]),
            payload_size,
            redundancy_type,
            checksums: vec![Checksum::from_bytes([0; 32])],
            create_at: 0,
            status: ObjectStatus::Sealed,
        }
    }

    fn params() -> StorageParams {
        StorageParams {
            max_segment_size: 400,
            redundant_data_chunk_num: 4,
            redundant_parity_chunk_num: 2,
            max_payload_size: 1 << 30,
        }
    }

    #[test]
    fn segment_stream_uses_segment_size() {
        let obj = object(1000, RedundancyType::Ec);
        assert_eq!(challenge_piece_size(&obj, &params(), -1, 2).unwrap(), 200);
    }

    #[test]
    fn ec_stream_uses_chunk_size() {
        let obj = object(1000, RedundancyType::Ec);
        assert_eq!(challenge_piece_size(&obj, &params(), 3, 0).unwrap(), 100);
        assert_eq!(challenge_piece_size(&obj, &params(), 3, 2).unwrap(), 50);
    }

    #[test]
    fn replica_stream_uses_segment_size() {
        let obj = object(1000, RedundancyType::Replica);
        assert_eq!(challenge_piece_size(&obj, &params(), 1, 0).unwrap(), 400);
    }
}
