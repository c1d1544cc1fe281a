//! `GET /greenfield/admin/v1/get-approval?action=CreateBucket|CreateObject`
//!
//! The unsigned message travels hex-encoded in `X-Gnfd-Unsigned-Msg`; the
//! signed message comes back hex-encoded in `X-Gnfd-Signed-Msg`.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::headers;
use crate::request::Requester;
use crate::state::AppState;

pub const PATH: &str = "/greenfield/admin/v1/get-approval";

pub fn router() -> Router<AppState> {
    Router::new().route(PATH, get(get_approval))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalQuery {
    #[serde(default)]
    pub action: String,
}

async fn get_approval(
    State(state): State<AppState>,
    Requester(requester): Requester,
    Query(query): Query<ApprovalQuery>,
    request_headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap), AppError> {
    let unsigned = headers::hex_bytes(&request_headers, headers::UNSIGNED_MSG)?;
    let signed = state
        .approvals
        .ask_approval(&requester, &query.action, &unsigned)
        .await?;
    tracing::info!(requester = %requester, action = %query.action, "approval issued");

    let mut response = HeaderMap::new();
    response.insert(headers::SIGNED_MSG, headers::value(hex::encode(signed))?);
    Ok((StatusCode::OK, response))
}
