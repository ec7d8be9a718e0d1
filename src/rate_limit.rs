//! Per-caller sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::routes::response::ApiError;

/// Remembers the request instants of every caller inside the window.
///
/// Eviction of stale instants, the limit check and recording the new request
/// happen under one lock, so concurrent requests from the same caller cannot
/// both take the last slot.
pub struct RateLimiter {
    cfg: RateLimitConfig,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            cfg,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub async fn allow(&self, identifier: &str) -> bool {
        self.allow_at(identifier, Instant::now()).await
    }

    pub(crate) async fn allow_at(&self, identifier: &str, now: Instant) -> bool {
        // ---
        let mut lock = self.requests.lock().await;
        let window = lock.entry(identifier.to_string()).or_default();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.cfg.window {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.cfg.max_requests {
            return false;
        }
        window.push_back(now);
        true
    }

    /// Forget callers with no request inside the window.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let window = self.cfg.window;
        self.requests.lock().await.retain(|_, hits| {
            hits.retain(|t| now.duration_since(*t) < window);
            !hits.is_empty()
        });
    }

    pub async fn tracked_callers(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Run [`cleanup`](Self::cleanup) once per window for the life of the
    /// process.
    pub fn spawn_cleanup(limiter: Arc<Self>) -> JoinHandle<()> {
        // ---
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(limiter.cfg.window);
            tick.tick().await;
            loop {
                tick.tick().await;
                limiter.cleanup().await;
                let callers = limiter.tracked_callers().await;
                tracing::debug!(callers, "rate limiter cleaned up");
            }
        })
    }
}

/// Caller identity: first `X-Forwarded-For` hop, else `X-Real-IP`.
pub fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// Axum middleware rejecting callers over their budget with `429`.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let caller = caller_id(request.headers());
    if !limiter.allow(&caller).await {
        tracing::warn!(caller = %caller, "rate limit exceeded");
        return ApiError::rate_limited().into_response();
    }
    next.run(request).await
}
