//! # Request Extractors
//!
//! The requester of an admin route is named by the `X-Gnfd-User-Address`
//! header. Request signature verification happens upstream of this service,
//! so the header is trusted as given.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use spn_core::{OperatorAddress, SpError};

use crate::error::AppError;
use crate::headers;

/// Account the request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester(pub OperatorAddress);

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(headers::USER_ADDRESS)
            .ok_or_else(|| {
                SpError::PermissionDenied(format!("{} header is required", headers::USER_ADDRESS))
            })?
            .to_str()
            .map_err(|e| AppError::InvalidHeader {
                name: headers::USER_ADDRESS,
                reason: e.to_string(),
            })?;
        let address = OperatorAddress::parse(raw.trim()).map_err(|e| AppError::InvalidHeader {
            name: headers::USER_ADDRESS,
            reason: e.to_string(),
        })?;
        Ok(Self(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use spn_core::ErrorKind;

    async fn extract(header: Option<&str>) -> Result<Requester, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = header {
            builder = builder.header(headers::USER_ADDRESS, v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Requester::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn parses_address() {
        let addr = format!("0x{}", "AB".repeat(20));
        let Requester(parsed) = extract(Some(&addr)).await.unwrap();
        assert_eq!(parsed.as_str(), format!("0x{}", "ab".repeat(20)));
    }

    #[tokio::test]
    async fn missing_header_is_permission_denied() {
        let err = extract(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn malformed_address_is_decode_failure() {
        let err = extract(Some("alice")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }
}
