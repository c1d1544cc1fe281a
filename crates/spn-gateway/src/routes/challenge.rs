//! `GET /greenfield/admin/v1/challenge`
//!
//! Serves one stored piece of an object. The response body is the raw piece;
//! the stream's integrity hash and piece checksums travel in headers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use spn_core::digest::join_hex;
use spn_core::ObjectId;

use crate::error::AppError;
use crate::headers;
use crate::request::Requester;
use crate::state::AppState;

pub const PATH: &str = "/greenfield/admin/v1/challenge";

pub fn router() -> Router<AppState> {
    Router::new().route(PATH, get(challenge_piece))
}

async fn challenge_piece(
    State(state): State<AppState>,
    Requester(requester): Requester,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    let object_id: ObjectId = headers::parse(&request_headers, headers::OBJECT_ID)?;
    let redundancy_idx: i32 = headers::parse(&request_headers, headers::REDUNDANCY_INDEX)?;
    let segment_idx: u32 = headers::parse(&request_headers, headers::PIECE_INDEX)?;

    let info = state
        .challenges
        .challenge(&requester, object_id, redundancy_idx, segment_idx)
        .await?;

    let mut response = HeaderMap::new();
    response.insert(headers::OBJECT_ID, headers::value(object_id.to_string())?);
    response.insert(
        headers::INTEGRITY_HASH,
        headers::value(info.integrity_hash.to_hex())?,
    );
    response.insert(headers::PIECE_HASH, headers::value(join_hex(&info.checksums))?);
    response.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    Ok((StatusCode::OK, response, Body::from(info.data)).into_response())
}
