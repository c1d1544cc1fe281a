//! # Approval Service
//!
//! Answers `get-approval` requests: a client sends an unsigned bucket or
//! object creation message and receives it back signed by this node as
//! primary provider. The steps run in a fixed order and the first failure
//! decides the error:
//!
//! 1. action recognised, else `UnsupportedRequest`
//! 2. message decodes, else `DecodeFailure`
//! 3. `validate_basic`, else `ValidationFailure`
//! 4. requester authorized, else `PermissionDenied`
//! 5. executor approves, else `ApprovalRefused`
//!
//! The signed message is returned as canonical (key-sorted) JSON.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use spn_core::{CanonicalBytes, ObjectInfo, OperatorAddress, SpError};
use spn_crypto::NodeIdentity;
use spn_task::{ApprovalAction, PolicyTable, ReplicatePieceApproval, Task, TaskPayload};

use crate::collaborator::{ApprovalOutcome, AuthOp, Authorizer, TaskExecutor};
use crate::deadline::bounded;

#[derive(Clone)]
pub struct ApprovalService {
    identity: NodeIdentity,
    authorizer: Arc<dyn Authorizer>,
    executor: Arc<dyn TaskExecutor>,
    policy: Arc<PolicyTable>,
    consensus_timeout: Duration,
}

impl std::fmt::Debug for ApprovalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalService")
            .field("operator_address", self.identity.operator_address())
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(msg: &[u8]) -> Result<T, SpError> {
    serde_json::from_slice(msg).map_err(|e| SpError::Decode(e.to_string()))
}

impl ApprovalService {
    pub fn new(
        identity: NodeIdentity,
        authorizer: Arc<dyn Authorizer>,
        executor: Arc<dyn TaskExecutor>,
        policy: Arc<PolicyTable>,
        consensus_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            authorizer,
            executor,
            policy,
            consensus_timeout,
        }
    }

    async fn authorize(
        &self,
        op: AuthOp,
        requester: &OperatorAddress,
        bucket: &str,
        object: &str,
    ) -> Result<(), SpError> {
        let allowed = bounded(
            "verify_authorize",
            self.consensus_timeout,
            self.authorizer.verify_authorize(op, requester, bucket, object),
        )
        .await?;
        if !allowed {
            return Err(SpError::PermissionDenied(format!(
                "{requester} may not {op} on {bucket}"
            )));
        }
        Ok(())
    }

    /// Sign a bucket or object creation message on behalf of `requester`.
    ///
    /// `msg` is the JSON of the unsigned message; the result is the JSON of
    /// the signed one.
    pub async fn ask_approval(
        &self,
        requester: &OperatorAddress,
        action: &str,
        msg: &[u8],
    ) -> Result<Vec<u8>, SpError> {
        let action: ApprovalAction = action.parse()?;
        let signed = match action {
            ApprovalAction::CreateBucket => {
                let msg: spn_task::CreateBucketApproval = decode(msg)?;
                msg.validate_basic()?;
                self.authorize(AuthOp::AskCreateBucketApproval, requester, &msg.bucket_name, "")
                    .await?;
                let task = Task::new(TaskPayload::CreateBucketApproval(msg), &self.policy);
                let outcome = bounded(
                    "ask_create_bucket_approval",
                    task.timeout(),
                    self.executor.ask_create_bucket_approval(&task),
                )
                .await?;
                match outcome {
                    ApprovalOutcome::Approved(signed) => CanonicalBytes::new(&signed)?,
                    ApprovalOutcome::Refused(reason) => {
                        tracing::info!(task_key = %task.key(), %reason, "bucket approval refused");
                        return Err(SpError::ApprovalRefused(reason));
                    }
                }
            }
            ApprovalAction::CreateObject => {
                let msg: spn_task::CreateObjectApproval = decode(msg)?;
                msg.validate_basic()?;
                self.authorize(
                    AuthOp::AskCreateObjectApproval,
                    requester,
                    &msg.bucket_name,
                    &msg.object_name,
                )
                .await?;
                let task = Task::new(TaskPayload::CreateObjectApproval(msg), &self.policy);
                let outcome = bounded(
                    "ask_create_object_approval",
                    task.timeout(),
                    self.executor.ask_create_object_approval(&task),
                )
                .await?;
                match outcome {
                    ApprovalOutcome::Approved(signed) => CanonicalBytes::new(&signed)?,
                    ApprovalOutcome::Refused(reason) => {
                        tracing::info!(task_key = %task.key(), %reason, "object approval refused");
                        return Err(SpError::ApprovalRefused(reason));
                    }
                }
            }
        };
        Ok(signed.into_vec())
    }

    /// Ask this node to accept replicated pieces of `object_info` from
    /// `ask_sp`. The returned approval names this node and carries its
    /// signature.
    pub async fn ask_replicate_piece_approval(
        &self,
        ask_sp: OperatorAddress,
        object_info: ObjectInfo,
    ) -> Result<ReplicatePieceApproval, SpError> {
        let template = ReplicatePieceApproval {
            object_info,
            ask_sp_operator_address: ask_sp,
            approved_sp_operator_address: self.identity.operator_address().clone(),
            approved_sp_endpoint: self.identity.endpoint().to_string(),
            expired_height: 0,
            create_time: chrono::Utc::now().timestamp(),
            approved_signature: None,
        };
        let task = Task::new(TaskPayload::ReplicatePieceApproval(template), &self.policy);
        let outcome = bounded(
            "ask_replicate_piece_approval",
            task.timeout(),
            self.executor.ask_replicate_piece_approval(&task),
        )
        .await?;
        match outcome {
            ApprovalOutcome::Approved(approval) => Ok(approval),
            ApprovalOutcome::Refused(reason) => Err(SpError::ApprovalRefused(reason)),
        }
    }
}
