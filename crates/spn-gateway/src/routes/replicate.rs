//! `PUT /greenfield/receiver/v1/replicate-piece`
//!
//! Receives one piece of a replicate stream, or finalizes the stream when
//! the receive message carries a negative piece index. Every call presents
//! the approval this node signed; it replaces requester authentication.
//!
//! The piece body is read only after the approval has been accepted.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::put;
use axum::Router;
use spn_core::SpError;
use spn_protocol::ReceiveOutcome;
use spn_task::{ReceivePieceTask, ReplicatePieceApproval};

use crate::error::AppError;
use crate::headers;
use crate::state::AppState;

pub const PATH: &str = "/greenfield/receiver/v1/replicate-piece";

/// Largest accepted piece body.
pub const MAX_PIECE_BYTES: usize = 64 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new().route(PATH, put(replicate_piece))
}

async fn replicate_piece(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, HeaderMap), AppError> {
    let approval: ReplicatePieceApproval =
        headers::hex_json(&request_headers, headers::REPLICATE_PIECE_APPROVAL)?;
    let grant = state.receiver.validate_approval(&approval).await?;
    let receive: ReceivePieceTask = headers::hex_json(&request_headers, headers::RECEIVE_MSG)?;
    let data = axum::body::to_bytes(body, MAX_PIECE_BYTES)
        .await
        .map_err(|e| {
            SpError::Validation(format!(
                "piece body unreadable or larger than {MAX_PIECE_BYTES} bytes: {e}"
            ))
        })?;

    let mut response = HeaderMap::new();
    match state
        .receiver
        .receive_piece(&grant, receive, data.to_vec())
        .await?
    {
        ReceiveOutcome::Stored => {}
        ReceiveOutcome::Finalized(proof) => {
            response.insert(
                headers::INTEGRITY_HASH,
                headers::value(proof.integrity_hash.to_hex())?,
            );
            response.insert(
                headers::INTEGRITY_HASH_SIGNATURE,
                headers::value(proof.signature.to_hex())?,
            );
        }
    }
    Ok((StatusCode::OK, response))
}
