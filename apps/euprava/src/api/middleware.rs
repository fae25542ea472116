//! # Middleware Module
//!
//! Rate limiting and request deadlines for every service router.
//!
//! ## Configuration
//!
//! - `rate_limit`: requests per second, shared by all callers (0 disables)
//! - `request_deadline_ms`: time budget of one request, outbound calls included

use super::error::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use euprava_core::EupravaError;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Fallback rate limit: 100 requests per second.
const DEFAULT_RPS: NonZeroU32 = match NonZeroU32::new(100) {
    Some(rps) => rps,
    None => NonZeroU32::MIN,
};

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new global rate limiter.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    let quota = Quota::per_second(rps);
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware.
///
/// Returns 429 Too Many Requests once the limit is exceeded.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    match limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// REQUEST DEADLINE
// =============================================================================

/// Instant by which the current request must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(pub tokio::time::Instant);

/// Stamp each request with a [`Deadline`] and drop the handler when it passes.
///
/// Dropping the handler future drops its in-flight outbound calls. Record
/// store writes are synchronous single transactions and never straddle an
/// await point, so a dropped handler leaves either the whole write or none.
pub async fn deadline_middleware(
    State(budget): State<Duration>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let deadline = tokio::time::Instant::now() + budget;
    request.extensions_mut().insert(Deadline(deadline));
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout_at(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                event = "deadline_exceeded",
                method = %method,
                path = %path,
                budget_ms = budget.as_millis() as u64,
                "Request deadline exceeded"
            );
            ApiError::from(EupravaError::Cancelled).into_response()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, middleware::from_fn_with_state, routing::get};
    use axum_test::TestServer;

    #[test]
    fn limiter_allows_burst_then_refuses() {
        let limiter = create_rate_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn zero_rate_falls_back_to_default() {
        let limiter = create_rate_limiter(0);
        for _ in 0..100 {
            assert!(limiter.check().is_ok());
        }
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }))
            .layer(from_fn_with_state(
                Duration::from_millis(50),
                deadline_middleware,
            ));
        let server = TestServer::new(app).unwrap();

        server.get("/fast").await.assert_status_ok();
        server
            .get("/slow")
            .await
            .assert_status(StatusCode::GATEWAY_TIMEOUT);
    }
}
