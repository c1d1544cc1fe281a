//! # spn-task: Task Identity & Policy
//!
//! Every unit of work the node performs (approvals, downloads, challenges,
//! replication, sealing, receiving, garbage collection) is a [`Task`]:
//!
//! - a closed [`TaskPayload`] sum type, one variant per [`TaskKind`];
//! - a deterministic, human-readable [`TaskKey`] derived from the payload;
//! - a priority, timeout and retry budget from the [`PolicyTable`].
//!
//! Tasks are value objects. Persisting and scheduling them is the task
//! executor's job.

pub mod approval;
pub mod key;
pub mod kind;
pub mod payload;
pub mod policy;
pub mod task;

pub use approval::{
    ApprovalAction, CreateBucketApproval, CreateObjectApproval, PrimarySpApproval,
    ReplicatePieceApproval, Visibility,
};
pub use key::{build_key, TaskKey};
pub use kind::TaskKind;
pub use payload::{
    ChallengePieceTask, DownloadObjectTask, DownloadPieceTask, GcObjectTask, ObjectTask,
    ReceivePieceTask,
};
pub use policy::{PolicyError, PolicyTable, Priority, PriorityLevel, TaskPolicy};
pub use task::{Task, TaskPayload};
