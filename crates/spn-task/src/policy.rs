//! # Task Policy
//!
//! Each task kind has a priority, a timeout window and a retry budget. For
//! kinds that move payload bytes the timeout scales with the expected I/O
//! size: `clamp(ceil(size / bytes_per_second) s, min_timeout, max_timeout)`.
//! Other kinds always get `min_timeout`.
//!
//! [`PolicyTable::default`] carries the built-in table. A YAML file can
//! override any subset of fields per kind:
//!
//! ```yaml
//! ChallengePiece:
//!   priority: 200
//!   max_timeout_secs: 120
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::TaskKind;

/// Scheduling priority. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

/// Coarse priority bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn level(&self) -> PriorityLevel {
        match self.0 {
            0..=84 => PriorityLevel::Low,
            85..=169 => PriorityLevel::Medium,
            _ => PriorityLevel::High,
        }
    }
}

/// Policy entry for one task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    pub priority: Priority,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    /// Expected throughput; `None` for kinds that move no payload.
    pub bytes_per_second: Option<u64>,
    pub max_retry: u32,
}

impl KindPolicy {
    /// Timeout for a task expected to move `size_hint` bytes.
    pub fn timeout_for(&self, size_hint: u64) -> Duration {
        match self.bytes_per_second {
            Some(bps) if bps > 0 => {
                let secs = size_hint.div_ceil(bps);
                Duration::from_secs(secs).clamp(self.min_timeout, self.max_timeout)
            }
            _ => self.min_timeout,
        }
    }
}

/// Priority, timeout and retry budget resolved for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPolicy {
    pub priority: Priority,
    pub timeout: Duration,
    pub max_retry: u32,
}

/// Errors loading or validating a policy table.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to parse policy file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    UnknownKind(String),

    #[error("invalid policy for {kind}: {reason}")]
    Invalid { kind: TaskKind, reason: String },
}

/// Partial policy entry as written in the YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverride {
    pub priority: Option<u8>,
    pub min_timeout_secs: Option<u64>,
    pub max_timeout_secs: Option<u64>,
    pub bytes_per_second: Option<u64>,
    pub max_retry: Option<u32>,
}

/// Per-kind policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    entries: HashMap<TaskKind, KindPolicy>,
}

const MIB: u64 = 1024 * 1024;

fn entry(priority: u8, min_secs: u64, max_secs: u64, bps: Option<u64>, max_retry: u32) -> KindPolicy {
    KindPolicy {
        priority: Priority(priority),
        min_timeout: Duration::from_secs(min_secs),
        max_timeout: Duration::from_secs(max_secs),
        bytes_per_second: bps,
        max_retry,
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        let entries = TaskKind::ALL
            .iter()
            .map(|&kind| {
                let policy = match kind {
                    TaskKind::CreateBucketApproval | TaskKind::CreateObjectApproval => {
                        entry(200, 10, 10, None, 0)
                    }
                    TaskKind::ReplicatePieceApproval => entry(200, 10, 10, None, 1),
                    TaskKind::ChallengePiece => entry(180, 5, 300, Some(4 * MIB), 3),
                    TaskKind::DownloadObject | TaskKind::DownloadPiece => {
                        entry(120, 5, 300, Some(4 * MIB), 2)
                    }
                    TaskKind::UploadObject => entry(100, 10, 600, Some(2 * MIB), 1),
                    TaskKind::ReplicatePiece => entry(100, 10, 600, Some(2 * MIB), 3),
                    TaskKind::ReceivePiece => entry(100, 10, 300, Some(4 * MIB), 1),
                    TaskKind::SealObject => entry(100, 10, 120, None, 3),
                    TaskKind::GCObject | TaskKind::GCZombiePiece | TaskKind::GCMeta => {
                        entry(20, 300, 300, None, 0)
                    }
                };
                (kind, policy)
            })
            .collect();
        Self { entries }
    }
}

impl PolicyTable {
    /// Entry for `kind`.
    pub fn get(&self, kind: TaskKind) -> KindPolicy {
        // The table is total over TaskKind; fall back to the defaults if a
        // caller somehow built a partial one.
        match self.entries.get(&kind) {
            Some(p) => *p,
            None => entry(100, 10, 10, None, 0),
        }
    }

    /// Priority, timeout and retry budget for a task of `kind` moving
    /// `size_hint` bytes.
    pub fn resolve(&self, kind: TaskKind, size_hint: u64) -> TaskPolicy {
        let p = self.get(kind);
        TaskPolicy {
            priority: p.priority,
            timeout: p.timeout_for(size_hint),
            max_retry: p.max_retry,
        }
    }

    /// Apply overrides from a YAML document on top of this table.
    pub fn merge_yaml(mut self, yaml: &str) -> Result<Self, PolicyError> {
        let overrides: BTreeMap<String, PolicyOverride> = serde_yaml::from_str(yaml)?;
        for (name, ov) in overrides {
            let kind: TaskKind = name.parse().map_err(PolicyError::UnknownKind)?;
            let mut p = self.get(kind);
            if let Some(v) = ov.priority {
                p.priority = Priority(v);
            }
            if let Some(v) = ov.min_timeout_secs {
                p.min_timeout = Duration::from_secs(v);
            }
            if let Some(v) = ov.max_timeout_secs {
                p.max_timeout = Duration::from_secs(v);
            }
            if let Some(v) = ov.bytes_per_second {
                p.bytes_per_second = Some(v);
            }
            if let Some(v) = ov.max_retry {
                p.max_retry = v;
            }
            validate_entry(kind, &p)?;
            self.entries.insert(kind, p);
        }
        Ok(self)
    }

    /// Built-in table with overrides read from `path`.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, PolicyError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::default().merge_yaml(&yaml)
    }
}

fn validate_entry(kind: TaskKind, p: &KindPolicy) -> Result<(), PolicyError> {
    if p.min_timeout > p.max_timeout {
        return Err(PolicyError::Invalid {
            kind,
            reason: format!(
                "min timeout {}s exceeds max timeout {}s",
                p.min_timeout.as_secs(),
                p.max_timeout.as_secs()
            ),
        });
    }
    if p.bytes_per_second == Some(0) {
        return Err(PolicyError::Invalid {
            kind,
            reason: "bytes_per_second must be positive".to_string(),
        });
    }
    Ok(())
}
