//! Greenfield wire headers and their decoders.

use std::str::FromStr;

use axum::http::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::AppError;

pub const USER_ADDRESS: &str = "X-Gnfd-User-Address";
pub const UNSIGNED_MSG: &str = "X-Gnfd-Unsigned-Msg";
pub const SIGNED_MSG: &str = "X-Gnfd-Signed-Msg";
pub const OBJECT_ID: &str = "X-Gnfd-Object-ID";
pub const REDUNDANCY_INDEX: &str = "X-Gnfd-Redundancy-Index";
pub const PIECE_INDEX: &str = "X-Gnfd-Piece-Index";
pub const INTEGRITY_HASH: &str = "X-Gnfd-Integrity-Hash";
pub const PIECE_HASH: &str = "X-Gnfd-Piece-Hash";
pub const REPLICATE_PIECE_APPROVAL: &str = "X-Gnfd-Replicate-Piece-Approval";
pub const RECEIVE_MSG: &str = "X-Gnfd-Receive-Msg";
pub const INTEGRITY_HASH_SIGNATURE: &str = "X-Gnfd-Integrity-Hash-Signature";
pub const REQUEST_ID: &str = "X-Request-Id";

/// Value of a required header as text.
pub fn required<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AppError> {
    let value = headers.get(name).ok_or(AppError::MissingHeader(name))?;
    value.to_str().map_err(|e| AppError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

/// Parse a required header with `FromStr`.
pub fn parse<T>(headers: &HeaderMap, name: &'static str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    required(headers, name)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::InvalidHeader {
            name,
            reason: e.to_string(),
        })
}

/// Raw bytes of a required hex-encoded header.
pub fn hex_bytes(headers: &HeaderMap, name: &'static str) -> Result<Vec<u8>, AppError> {
    hex::decode(required(headers, name)?.trim()).map_err(|e| AppError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

/// Decode a required header carrying hex-encoded JSON.
pub fn hex_json<T: DeserializeOwned>(headers: &HeaderMap, name: &'static str) -> Result<T, AppError> {
    let bytes = hex_bytes(headers, name)?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

/// Header value for text we produced ourselves (hex, decimal).
pub fn value(text: impl AsRef<str>) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(text.as_ref()).map_err(|e| {
        AppError::Protocol(spn_core::SpError::Internal(format!(
            "unencodable header value: {e}"
        )))
    })
}
