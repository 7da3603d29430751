use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failure_count: usize,
    last_failure: Option<Instant>,
}

/// Fails fast when the booking commit path keeps erroring, so a struggling
/// store is not hammered by retry storms.
pub struct CircuitBreaker {
    pub name: String,
    inner: Mutex<Inner>,
    failure_threshold: usize,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            failure_threshold: threshold,
            reset_timeout: timeout,
        }
    }

    /// True if a request may pass. An Open circuit lets one probe through
    /// after the reset timeout by moving to Half-Open.
    pub async fn check(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if let Some(instant) = inner.last_failure {
                    if instant.elapsed() > self.reset_timeout {
                        inner.state = CircuitState::HalfOpen;
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        return true;
                    }
                }
                false
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == CircuitState::HalfOpen {
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;
        if inner.failure_count >= self.failure_threshold || inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            inner.last_failure = Some(Instant::now());
            tracing::error!(
                "Circuit Breaker [{}] TRIPPED to Open. Failures: {}",
                self.name,
                inner.failure_count
            );
        }
    }
}

pub struct ResiliencyState {
    pub booking_cb: CircuitBreaker,
}

impl ResiliencyState {
    pub fn new() -> Self {
        Self {
            booking_cb: CircuitBreaker::new("booking-commit", 5, Duration::from_secs(30)),
        }
    }
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> impl IntoResponse {
    // Only the booking commit path is guarded; reads and admin traffic pass
    // straight through.
    let guarded = req.method() == axum::http::Method::POST
        && req.uri().path().starts_with("/v1/bookings");

    if !guarded {
        return next.run(req).await.into_response();
    }

    let cb = &state.resiliency.booking_cb;
    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Circuit Breaker [{}] is OPEN", cb.name),
        )
            .into_response();
    }

    let response = next.run(req).await;

    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }

    response.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trips_after_threshold_and_recovers_via_half_open() {
        let cb = CircuitBreaker::new("test", 3, Duration::from_millis(10));
        assert!(cb.check().await);

        cb.record_failure().await;
        cb.record_failure().await;
        assert!(cb.check().await);
        cb.record_failure().await;
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        // One probe is allowed through.
        assert!(cb.check().await);
        cb.record_success().await;
        assert!(cb.check().await);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(10));
        cb.record_failure().await;
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cb.check().await);
        cb.record_failure().await;
        assert!(!cb.check().await);
    }
}
