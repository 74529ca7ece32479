use std::num::NonZeroU32;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::AppState;

/// Global (not per-client) token bucket.
pub struct AppRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl std::fmt::Debug for AppRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRateLimiter").finish_non_exhaustive()
    }
}

impl AppRateLimiter {
    #[must_use]
    pub fn new(requests_per_second: f32, burst_size: u32) -> Self {
        let burst = NonZeroU32::new(burst_size).unwrap_or(nonzero!(1u32));
        let period = Duration::from_secs_f32(1.0 / requests_per_second.max(0.001));
        let quota = Quota::with_period(period)
            .map_or_else(|| Quota::per_second(burst), |q| q.allow_burst(burst));

        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Take one request slot if available.
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Middleware to enforce rate limits
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if state.config.resilience.rate_limit_enabled && !state.rate_limiter.check() {
        tracing::warn!(name: "http.rate_limited", path = %req.uri().path(), "Request rate limited");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_burst_then_refill() {
        let limiter = AppRateLimiter::new(2.0, 5); // 2 req/s, 5 burst

        // Consume all burst
        for _ in 0..5 {
            assert!(limiter.check());
        }

        // Next should fail (immediate)
        assert!(!limiter.check());

        // One cell is replenished every 500ms
        std::thread::sleep(Duration::from_millis(600));
        assert!(limiter.check());

        // Immediate fail
        assert!(!limiter.check());
    }

    #[test]
    fn test_zero_burst_still_allows_one() {
        let limiter = AppRateLimiter::new(1.0, 0);
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
