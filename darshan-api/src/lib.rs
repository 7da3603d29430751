use axum::{
    extract::State,
    http::Method,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod pilgrims;
pub mod slots;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .merge(auth::routes())
        .merge(slots::routes())
        .merge(metrics::routes())
        .route("/health", get(health));

    let pilgrim = Router::new()
        .merge(bookings::routes())
        .merge(pilgrims::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::pilgrim_auth_middleware,
        ));

    let admin = Router::new().merge(admin::routes()).layer(
        axum::middleware::from_fn_with_state(state.clone(), middleware::auth::admin_auth_middleware),
    );

    Router::new()
        .merge(public)
        .merge(pilgrim)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::resiliency::circuit_breaker_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

/// Readiness probe: a cheap round trip to the store, since nothing works
/// without it.
async fn health(
    State(state): State<AppState>,
) -> Result<&'static str, (axum::http::StatusCode, &'static str)> {
    match sqlx::query("SELECT 1").execute(&state.db.pool).await {
        Ok(_) => Ok("ok"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            Err((
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                "database unavailable",
            ))
        }
    }
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, impl IntoResponse> {
    let ip = addr.ip().to_string();
    let key = format!("ratelimit:{}", ip);

    match state.redis.check_rate_limit(&key, 100, 60).await {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err((axum::http::StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")),
        Err(_) => Ok(next.run(req).await), // Fail open
    }
}
