//! HTTP gateway.
//!
//! Each sibling module exports a subrouter; this module merges them, attaches
//! the shared state and wraps the result in the cross-cutting layers (rate
//! limiting, request tracing, CORS and security headers). `main.rs` only sees
//! [`router`].

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode, Uri},
    middleware,
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::error::DataError;
use crate::rate_limit::{self, RateLimiter};
use crate::repository::Repository;

mod alerts;
mod dashboard;
mod health;
pub mod params;
mod readings;
pub mod response;
mod sensors;

use response::ApiError;

pub const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
pub const ALLOWED_HEADERS: &str =
    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    /// Attach redacted causes to 500 responses.
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(repo: Repository, expose_error_details: bool) -> Self {
        Self {
            repo,
            expose_error_details,
        }
    }

    /// Translate a data layer failure into the error envelope.
    pub(crate) fn fail(&self, err: DataError, context: &str) -> ApiError {
        ApiError::from_data(err, context, self.expose_error_details)
    }
}

pub fn router(state: AppState, limiter: Option<Arc<RateLimiter>>) -> Router {
    // ---
    let mut app: Router = Router::new()
        .merge(sensors::router())
        .merge(readings::router())
        .merge(dashboard::router())
        .merge(alerts::router())
        .merge(health::router())
        .fallback(route_not_found)
        .with_state(state);

    if let Some(limiter) = limiter {
        app = app.layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(static_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .layer(static_header(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS))
        .layer(static_header(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS))
        .layer(static_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(static_header(header::X_FRAME_OPTIONS, "DENY"))
        .layer(static_header(
            header::REFERRER_POLICY,
            "strict-origin-when-cross-origin",
        ))
}

fn static_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

/// CORS preflight. The headers come from the outer layers.
pub(crate) async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}
