//! # spn-gateway: HTTP Gateway for the Storage-Provider Node
//!
//! Exposes the approval, challenge and replicate-piece protocols over HTTP
//! with the Greenfield header conventions.
//!
//! ## API Surface
//!
//! | Route | Module |
//! |---|---|
//! | `GET /greenfield/admin/v1/get-approval` | [`routes::approval`] |
//! | `GET /greenfield/admin/v1/challenge` | [`routes::challenge`] |
//! | `PUT /greenfield/receiver/v1/replicate-piece` | [`routes::replicate`] |
//! | `GET /health/liveness`, `GET /health/readiness` | this module |
//! | `GET /metrics` | this module |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → RequestId → Metrics → Handler
//! ```
//!
//! ## Crate Policy
//!
//! - No protocol logic in handlers. They decode headers, call a service
//!   from [`spn_protocol`], and encode the result.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod headers;
pub mod middleware;
pub mod request;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use spn_protocol::deadline::bounded;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Assemble the application router.
///
/// Health probes and `/metrics` sit outside the request middleware so
/// scrapes and probes do not count as API traffic.
pub fn app(state: AppState) -> Router {
    let api = routes::router()
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(from_fn(middleware::request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

/// Liveness probe. The process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The chain answers a height query in time.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match bounded(
        "current_height",
        state.consensus_timeout,
        state.consensus.current_height(),
    )
    .await
    {
        Ok(_) => (StatusCode::OK, "ready").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "consensus unreachable").into_response()
        }
    }
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics() -> impl IntoResponse {
    match middleware::metrics::prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder unavailable").into_response(),
    }
}
