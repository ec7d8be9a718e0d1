//! Backend for the IoT monitoring dashboard.
//!
//! Sensors report readings over HTTP; readings are stored per sensor with a
//! 30 day retention, alerts are derived from each reading, and the dashboard
//! reads aggregates back out. Storage sits behind the [`DocumentStore`] port
//! with a Postgres and an in-memory backend.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module exposes a small surface, and HTTP concerns stay inside `routes`.

use std::sync::Arc;

use axum::Router;

pub mod alerts;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod rate_limit;
pub mod records;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{DataError, Entity};
pub use rate_limit::RateLimiter;
pub use repository::Repository;
pub use routes::AppState;
pub use store::{DocumentStore, MemoryStore, PgStore, StoreError};

// ---

/// Assemble the HTTP application over `store` as configured by `cfg`.
///
/// The rate limiter, when enabled, is returned alongside the router so the
/// caller can schedule [`RateLimiter::cleanup`].
pub fn build_app(
    cfg: &Config,
    store: Arc<dyn DocumentStore>,
) -> (Router, Option<Arc<RateLimiter>>) {
    // ---
    let repo = Repository::new(store, cfg.store_timeout);
    let limiter = cfg.rate_limit.map(|rl| Arc::new(RateLimiter::new(rl)));
    let app = routes::router(
        AppState::new(repo, cfg.expose_error_details),
        limiter.clone(),
    );
    (app, limiter)
}
