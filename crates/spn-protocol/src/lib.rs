//! # spn-protocol: Storage-Provider Protocols
//!
//! The request-level protocols of a storage-provider node, written against
//! narrow collaborator traits:
//!
//! - [`approval`]: sign bucket and object creation messages as primary.
//! - [`replication`]: validate replicate approvals, receive pieces and
//!   finalize streams with a signed integrity proof.
//! - [`challenge`]: serve a stored piece plus its integrity proof.
//!
//! [`executor::LocalExecutor`] runs the tasks these protocols build against
//! the in-memory collaborators of [`memory`] or the filesystem store of
//! [`fs_store`]. Every collaborator call is bounded by [`deadline::bounded`].

pub mod approval;
pub mod challenge;
pub mod collaborator;
pub mod deadline;
pub mod executor;
pub mod fs_store;
pub mod memory;
pub mod replication;

pub use approval::ApprovalService;
pub use challenge::{challenge_piece_size, ChallengeService};
pub use collaborator::{
    ApprovalOutcome, AuthOp, Authorizer, ChallengeInfo, Consensus, IntegrityProof,
    IntegrityStore, PieceStore, TaskExecutor,
};
pub use executor::{LocalExecutor, DEFAULT_APPROVAL_TIMEOUT_HEIGHT, DEFAULT_SESSION_TTL};
pub use fs_store::FsPieceStore;
pub use memory::{
    ChainFixture, MemoryAuthorizer, MemoryChain, MemoryIntegrityStore, MemoryPieceStore,
    ObjectFixture, StorageParamsEntry,
};
pub use replication::{ApprovalGrant, IntegritySignDoc, ReceiveOutcome, ReceiveService};
