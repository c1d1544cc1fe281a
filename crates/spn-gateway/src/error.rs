//! # API Error Types
//!
//! Maps [`SpError`] to HTTP responses. Every error response carries a JSON
//! body of the form
//!
//! ```json
//! {"error": {"code": 10002, "kind": "VALIDATION_FAILURE", "message": "..."}}
//! ```
//!
//! Internal and storage failures are logged server-side and reported with a
//! generic message so local paths and backend details never reach clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use spn_core::{ErrorKind, SpError};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable numeric code.
    pub code: u32,
    /// Machine-readable kind, e.g. `"APPROVAL_EXPIRED"`.
    pub kind: String,
    pub message: String,
}

/// Error type returned by every handler.
#[derive(Error, Debug)]
pub enum AppError {
    /// Failure reported by a protocol or collaborator.
    #[error(transparent)]
    Protocol(#[from] SpError),

    /// A required request header is absent.
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    /// A request header is present but cannot be decoded.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(e) => e.kind(),
            Self::MissingHeader(_) | Self::InvalidHeader { .. } => ErrorKind::DecodeFailure,
        }
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = self.status();

        let message = match kind {
            ErrorKind::Internal => "An internal error occurred".to_string(),
            ErrorKind::TransientIo => "A storage error occurred".to_string(),
            _ => self.to_string(),
        };

        match kind {
            ErrorKind::Internal | ErrorKind::TransientIo => {
                tracing::error!(error = %self, kind = %kind, "request failed")
            }
            ErrorKind::ConsensusUnavailable | ErrorKind::Timeout => {
                tracing::warn!(error = %self, kind = %kind, "request failed")
            }
            _ => tracing::debug!(error = %self, kind = %kind, "request rejected"),
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: kind.code(),
                kind: kind.as_str().to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
