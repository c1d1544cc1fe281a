//! # Middleware Modules
//!
//! Tower middleware layers for the gateway.

pub mod metrics;
pub mod request_id;
