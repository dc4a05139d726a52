//! Rate limiting middleware using Governor.
//!
//! Implements per-API-key rate limiting with a token bucket algorithm.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc, time::Duration};

use hostel_types::Principal;

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    /// Per-key rate limiters
    limiters: DashMap<String, Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    quota: Quota,
    /// Time for one token to come back
    refill: Duration,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Allows a burst of `requests`, refilled evenly over `period`.
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiters: DashMap::new(),
            refill: quota.replenish_interval(),
            quota,
        }
    }

    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        let limiter = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone();

        limiter.check().is_ok()
    }

    /// Whole seconds until a limited key may send again, rounded up.
    pub fn retry_after_seconds(&self) -> u64 {
        let secs = self.refill.as_secs() + u64::from(self.refill.subsec_nanos() > 0);
        secs.max(1)
    }
}

/// Rate limiting middleware.
/// Runs after authentication and buckets requests by API key id.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.key_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&key) {
        tracing::warn!(%key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "code": 429,
                "retry_after_seconds": limiter.retry_after_seconds()
            })),
        )
            .into_response();
    }

    next.run(request).await
}
