//! # Route Modules
//!
//! | Route | Module |
//! |---|---|
//! | `GET /greenfield/admin/v1/get-approval` | [`approval`] |
//! | `GET /greenfield/admin/v1/challenge` | [`challenge`] |
//! | `PUT /greenfield/receiver/v1/replicate-piece` | [`replicate`] |

pub mod approval;
pub mod challenge;
pub mod replicate;

use axum::Router;

use crate::state::AppState;

/// All protocol routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(approval::router())
        .merge(challenge::router())
        .merge(replicate::router())
}
