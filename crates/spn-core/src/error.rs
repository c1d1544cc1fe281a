//! # Error Hierarchy
//!
//! Every failure the node can report is one variant of [`SpError`]. Each
//! variant belongs to exactly one [`ErrorKind`], and each kind carries a
//! stable numeric code, the HTTP status it maps to on the wire, and whether
//! the caller may retry it under the task's retry policy.
//!
//! ## Design
//!
//! - Decode, validation, permission, approval and signature failures are
//!   terminal for the request.
//! - Consensus, storage I/O and timeout failures are retryable; the retry
//!   itself is the caller's responsibility.
//! - Messages carry enough detail to log. The gateway decides which of them
//!   may be shown to a remote caller.

use thiserror::Error;

/// Closed classification of [`SpError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed hex or JSON payload.
    DecodeFailure,
    /// Structurally invalid request (bad index, bad name, wrong length).
    ValidationFailure,
    /// The authorization collaborator refused the operation.
    PermissionDenied,
    /// A replicate-piece approval names a different provider.
    ApprovalMismatch,
    /// The chain height has passed the approval's expiry height.
    ApprovalExpired,
    /// A signature did not verify.
    SignatureInvalid,
    /// Unknown action or task kind.
    UnsupportedRequest,
    /// The approver declined to serve the bucket or object.
    ApprovalRefused,
    /// A referenced object, bucket, piece or record is absent.
    NotFound,
    /// Generic upstream consensus failure.
    ConsensusUnavailable,
    /// Piece storage read or write failure.
    TransientIo,
    /// A collaborator call exceeded the task timeout.
    Timeout,
    /// Local failure that is neither the caller's nor a collaborator's fault.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecodeFailure => "DECODE_FAILURE",
            Self::ValidationFailure => "VALIDATION_FAILURE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ApprovalMismatch => "APPROVAL_MISMATCH",
            Self::ApprovalExpired => "APPROVAL_EXPIRED",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::UnsupportedRequest => "UNSUPPORTED_REQUEST",
            Self::ApprovalRefused => "APPROVAL_REFUSED",
            Self::NotFound => "NOT_FOUND",
            Self::ConsensusUnavailable => "CONSENSUS_UNAVAILABLE",
            Self::TransientIo => "TRANSIENT_IO",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Stable numeric error code reported on the wire.
    pub fn code(&self) -> u32 {
        match self {
            Self::DecodeFailure => 10001,
            Self::ValidationFailure => 10002,
            Self::PermissionDenied => 10003,
            Self::ApprovalMismatch => 10004,
            Self::ApprovalExpired => 10005,
            Self::SignatureInvalid => 10006,
            Self::UnsupportedRequest => 10007,
            Self::ApprovalRefused => 10008,
            Self::NotFound => 10009,
            Self::ConsensusUnavailable => 10010,
            Self::TransientIo => 10011,
            Self::Timeout => 10012,
            Self::Internal => 10013,
        }
    }

    /// HTTP status code this kind maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::DecodeFailure
            | Self::ValidationFailure
            | Self::ApprovalMismatch
            | Self::ApprovalExpired
            | Self::SignatureInvalid
            | Self::UnsupportedRequest => 400,
            Self::PermissionDenied => 401,
            Self::ApprovalRefused => 403,
            Self::NotFound => 404,
            Self::TransientIo | Self::Internal => 500,
            Self::ConsensusUnavailable => 503,
            Self::Timeout => 504,
        }
    }

    /// Whether a caller may retry the task under its retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConsensusUnavailable | Self::TransientIo | Self::Timeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the storage-provider node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpError {
    /// Malformed hex or JSON payload.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// Structurally invalid approval, task, or piece.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Authorization refused.
    #[error("no permission to operate: {0}")]
    PermissionDenied(String),

    /// Approval names another storage provider.
    #[error("approval is for provider {approved}, this provider is {local}")]
    ApprovalMismatch {
        /// Operator address carried by the approval.
        approved: String,
        /// This node's operator address.
        local: String,
    },

    /// Approval validity window has passed.
    #[error("approval expired at height {expired_height}, current height is {current_height}")]
    ApprovalExpired {
        /// Last chain height at which the approval is valid.
        expired_height: u64,
        /// Height observed when the approval was checked.
        current_height: u64,
    },

    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Unknown action or task kind.
    #[error("unsupported request: {0}")]
    Unsupported(String),

    /// Approver declined the request.
    #[error("approval refused: {0}")]
    ApprovalRefused(String),

    /// Referenced resource is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Consensus collaborator failed for a reason other than absence.
    #[error("consensus unavailable: {0}")]
    ConsensusUnavailable(String),

    /// Piece storage read or write failure.
    #[error("storage I/O failure: {0}")]
    TransientIo(String),

    /// A bounded collaborator call ran out of time.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// Name of the bounded operation.
        operation: String,
        /// The bound that was exceeded.
        millis: u64,
    },

    /// Local failure (serialization of a well-formed value, key handling).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SpError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::DecodeFailure,
            Self::Validation(_) => ErrorKind::ValidationFailure,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::ApprovalMismatch { .. } => ErrorKind::ApprovalMismatch,
            Self::ApprovalExpired { .. } => ErrorKind::ApprovalExpired,
            Self::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            Self::Unsupported(_) => ErrorKind::UnsupportedRequest,
            Self::ApprovalRefused(_) => ErrorKind::ApprovalRefused,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConsensusUnavailable(_) => ErrorKind::ConsensusUnavailable,
            Self::TransientIo(_) => ErrorKind::TransientIo,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Numeric code of this error's kind.
    pub fn code(&self) -> u32 {
        self.kind().code()
    }

    /// HTTP status of this error's kind.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Whether the caller may retry.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<CanonicalizationError> for SpError {
    fn from(err: CanonicalizationError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for SpError {
    fn from(err: std::io::Error) -> Self {
        Self::TransientIo(err.to_string())
    }
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values have no single canonical rendering; amounts and heights
    /// must be integers or strings.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
