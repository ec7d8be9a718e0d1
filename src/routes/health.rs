//! Liveness endpoint.
//!
//! `GET /health` answers from memory only; it never touches the store, so
//! orchestrators can poll it while the database is down.

use axum::{routing::get, Router};
use serde::Serialize;

use super::preflight;
use super::response::{ok, ApiResponse};
use crate::models::{format_timestamp, now_millis};

pub const SERVICE_NAME: &str = "iot-dashboard-api";

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    service: &'static str,
}

async fn health() -> ApiResponse<Health> {
    ok(
        Health {
            status: "healthy",
            timestamp: format_timestamp(&now_millis()),
            version: env!("CARGO_PKG_VERSION"),
            service: SERVICE_NAME,
        },
        "Service is healthy",
    )
}

/// Generic over the gateway state so it merges into any router.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health).options(preflight))
}
