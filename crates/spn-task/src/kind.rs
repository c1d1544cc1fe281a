//! Task kinds and their persisted key prefixes.

use serde::{Deserialize, Serialize};

/// Every unit of work the node schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    CreateBucketApproval,
    CreateObjectApproval,
    ReplicatePieceApproval,
    DownloadObject,
    DownloadPiece,
    ChallengePiece,
    UploadObject,
    ReplicatePiece,
    SealObject,
    ReceivePiece,
    GCObject,
    GCZombiePiece,
    GCMeta,
}

/// Total number of task kinds.
pub const TASK_KIND_COUNT: usize = 13;

impl TaskKind {
    /// All kinds, in declaration order.
    pub const ALL: [TaskKind; TASK_KIND_COUNT] = [
        Self::CreateBucketApproval,
        Self::CreateObjectApproval,
        Self::ReplicatePieceApproval,
        Self::DownloadObject,
        Self::DownloadPiece,
        Self::ChallengePiece,
        Self::UploadObject,
        Self::ReplicatePiece,
        Self::SealObject,
        Self::ReceivePiece,
        Self::GCObject,
        Self::GCZombiePiece,
        Self::GCMeta,
    ];

    /// Key prefix. These strings are persisted by task executors and must
    /// never change.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::CreateBucketApproval => "CreateBucketApproval",
            Self::CreateObjectApproval => "CreateObjectApproval",
            Self::ReplicatePieceApproval => "ReplicatePieceApproval",
            Self::DownloadObject => "DownloadObject",
            Self::DownloadPiece => "DownloadPiece",
            Self::ChallengePiece => "ChallengePiece",
            Self::UploadObject => "Uploading",
            Self::ReplicatePiece => "Replicating",
            Self::SealObject => "Sealing",
            Self::ReceivePiece => "ReceivePiece",
            Self::GCObject => "gcobject",
            Self::GCZombiePiece => "gczombiepiece",
            Self::GCMeta => "gcmeta",
        }
    }

    /// Name used in logs, metrics labels and the policy file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBucketApproval => "CreateBucketApproval",
            Self::CreateObjectApproval => "CreateObjectApproval",
            Self::ReplicatePieceApproval => "ReplicatePieceApproval",
            Self::DownloadObject => "DownloadObject",
            Self::DownloadPiece => "DownloadPiece",
            Self::ChallengePiece => "ChallengePiece",
            Self::UploadObject => "UploadObject",
            Self::ReplicatePiece => "ReplicatePiece",
            Self::SealObject => "SealObject",
            Self::ReceivePiece => "ReceivePiece",
            Self::GCObject => "GCObject",
            Self::GCZombiePiece => "GCZombiePiece",
            Self::GCMeta => "GCMeta",
        }
    }

    /// Whether the task moves payload bytes, so its timeout scales with size.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::DownloadObject
                | Self::DownloadPiece
                | Self::ChallengePiece
                | Self::UploadObject
                | Self::ReplicatePiece
                | Self::ReceivePiece
        )
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown task kind {s:?}"))
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
