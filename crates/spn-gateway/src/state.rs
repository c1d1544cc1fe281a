//! # Application State
//!
//! Shared state handed to every handler: the node identity and the three
//! protocol services, all wired to the same collaborators.

use std::sync::Arc;
use std::time::Duration;

use spn_crypto::NodeIdentity;
use spn_protocol::{
    ApprovalService, Authorizer, ChallengeService, Consensus, ReceiveService, TaskExecutor,
};
use spn_task::PolicyTable;

/// The external services a node runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub authorizer: Arc<dyn Authorizer>,
    pub consensus: Arc<dyn Consensus>,
    pub executor: Arc<dyn TaskExecutor>,
}

#[derive(Clone)]
pub struct AppState {
    pub identity: NodeIdentity,
    pub consensus: Arc<dyn Consensus>,
    pub approvals: ApprovalService,
    pub challenges: ChallengeService,
    pub receiver: ReceiveService,
    pub consensus_timeout: Duration,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("operator_address", self.identity.operator_address())
            .field("consensus_timeout", &self.consensus_timeout)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        identity: NodeIdentity,
        collaborators: Collaborators,
        policy: PolicyTable,
        consensus_timeout: Duration,
    ) -> Self {
        let policy = Arc::new(policy);
        let Collaborators {
            authorizer,
            consensus,
            executor,
        } = collaborators;
        Self {
            approvals: ApprovalService::new(
                identity.clone(),
                authorizer.clone(),
                executor.clone(),
                policy.clone(),
                consensus_timeout,
            ),
            challenges: ChallengeService::new(
                authorizer,
                consensus.clone(),
                executor.clone(),
                policy.clone(),
                consensus_timeout,
            ),
            receiver: ReceiveService::new(
                identity.clone(),
                consensus.clone(),
                executor,
                policy,
                consensus_timeout,
            ),
            identity,
            consensus,
            consensus_timeout,
        }
    }
}
