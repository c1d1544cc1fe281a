//! # Approval Messages
//!
//! The three approvals a provider issues:
//!
//! - [`CreateBucketApproval`] and [`CreateObjectApproval`] are asked for by
//!   users before they submit the create transaction. The primary provider
//!   fills in `primary_sp_approval` with an expiry height and its signature.
//! - [`ReplicatePieceApproval`] is asked for by a primary provider before it
//!   pushes pieces. The receiving provider issues it with its own key, so it
//!   later verifies the approval against its own public identity.
//!
//! In every case the signed bytes are the canonical JSON of the message with
//! the signature field removed.

use serde::{Deserialize, Serialize};
use spn_core::{CanonicalBytes, Checksum, ObjectInfo, OperatorAddress, RedundancyType, SpError};
use spn_crypto::Ed25519Signature;

/// Approval actions accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalAction {
    CreateBucket,
    CreateObject,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBucket => "CreateBucket",
            Self::CreateObject => "CreateObject",
        }
    }
}

impl std::str::FromStr for ApprovalAction {
    type Err = SpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CreateBucket" => Ok(Self::CreateBucket),
            "CreateObject" => Ok(Self::CreateObject),
            other => Err(SpError::Unsupported(format!("approval action {other:?}"))),
        }
    }
}

/// Read visibility of a bucket or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    PublicRead,
    #[default]
    Private,
    Inherit,
}

/// Expiry and signature the primary provider attaches to a user request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimarySpApproval {
    #[serde(default)]
    pub expired_height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<Ed25519Signature>,
}

/// Bucket names: 3..=63 chars of `[a-z0-9-.]`, not starting or ending with
/// `-` or `.`.
pub fn validate_bucket_name(name: &str) -> Result<(), SpError> {
    let len = name.len();
    if !(3..=63).contains(&len) {
        return Err(SpError::Validation(format!(
            "bucket name {name:?} must be 3 to 63 characters, got {len}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(SpError::Validation(format!(
            "bucket name {name:?} may only contain lowercase letters, digits, '-' and '.'"
        )));
    }
    let edge = |c: char| c == '-' || c == '.';
    if name.starts_with(edge) || name.ends_with(edge) {
        return Err(SpError::Validation(format!(
            "bucket name {name:?} must not start or end with '-' or '.'"
        )));
    }
    Ok(())
}

/// Object names: 1..=1024 bytes.
pub fn validate_object_name(name: &str) -> Result<(), SpError> {
    if name.is_empty() || name.len() > 1024 {
        return Err(SpError::Validation(format!(
            "object name must be 1 to 1024 bytes, got {}",
            name.len()
        )));
    }
    Ok(())
}

/// Request to create a bucket, as signed by the primary provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBucketApproval {
    pub creator: OperatorAddress,
    pub bucket_name: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub payment_address: OperatorAddress,
    pub primary_sp_address: OperatorAddress,
    #[serde(default)]
    pub primary_sp_approval: PrimarySpApproval,
    #[serde(default)]
    pub charged_read_quota: u64,
}

impl CreateBucketApproval {
    pub fn validate_basic(&self) -> Result<(), SpError> {
        validate_bucket_name(&self.bucket_name)
    }

    /// Canonical bytes of the message without its signature.
    pub fn signable_bytes(&self) -> Result<CanonicalBytes, SpError> {
        let mut unsigned = self.clone();
        unsigned.primary_sp_approval.sig = None;
        Ok(CanonicalBytes::new(&unsigned)?)
    }
}

/// Request to create an object, as signed by the primary provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateObjectApproval {
    pub creator: OperatorAddress,
    pub bucket_name: String,
    pub object_name: String,
    pub payload_size: u64,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub primary_sp_approval: PrimarySpApproval,
    pub expect_checksums: Vec<Checksum>,
    pub redundancy_type: RedundancyType,
}

impl CreateObjectApproval {
    pub fn validate_basic(&self) -> Result<(), SpError> {
        validate_bucket_name(&self.bucket_name)?;
        validate_object_name(&self.object_name)?;
        if self.expect_checksums.is_empty() {
            return Err(SpError::Validation(
                "at least one expected checksum is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Canonical bytes of the message without its signature.
    pub fn signable_bytes(&self) -> Result<CanonicalBytes, SpError> {
        let mut unsigned = self.clone();
        unsigned.primary_sp_approval.sig = None;
        Ok(CanonicalBytes::new(&unsigned)?)
    }
}

/// Permission for `ask_sp_operator_address` to push pieces of
/// `object_info` to `approved_sp_operator_address` until `expired_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatePieceApproval {
    pub object_info: ObjectInfo,
    pub ask_sp_operator_address: OperatorAddress,
    pub approved_sp_operator_address: OperatorAddress,
    pub approved_sp_endpoint: String,
    pub expired_height: u64,
    /// Unix seconds.
    pub create_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_signature: Option<Ed25519Signature>,
}

impl ReplicatePieceApproval {
    /// Canonical bytes of every field except the signature.
    pub fn signable_bytes(&self) -> Result<CanonicalBytes, SpError> {
        let mut unsigned = self.clone();
        unsigned.approved_signature = None;
        Ok(CanonicalBytes::new(&unsigned)?)
    }
}
