//! HTTP API surface. Handlers return `impl IntoResponse`
//! and use the `DataResponse`/`json_error`-style envelope helpers from
//! `actions/mod.rs`, generalized to the shapes this crate's endpoints need.

mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, Method};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use axum_extra::headers::authorization::{Authorization, Bearer};
use axum_extra::headers::Header;
use tower_http::cors::CorsLayer;

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::elevation::ElevationClient;
use crate::flight_service::FlightService;
use crate::rate_limiter::RateLimiter;
use crate::route_client::RouteClient;
use crate::session::SessionStore;
use crate::token_manager::TokenManager;
use crate::ws::WsHub;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<Cache>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub flight_service: Arc<FlightService>,
    pub route_client: Arc<RouteClient>,
    pub elevation_client: Arc<ElevationClient>,
    pub anonymous_token_manager: Option<Arc<TokenManager>>,
    pub ws_hub: Arc<WsHub>,
    pub started_at: Instant,
}

/// Reads the BYOK session token from `X-Session-Token` or an
/// `Authorization: Bearer` header. The bearer form is
/// decoded with the same `axum_extra::headers` typed parser `auth.rs` uses
/// for its `TypedHeader<Authorization<Bearer>>` extractor.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-session-token").and_then(|v| v.to_str().ok()) {
        return Some(value.to_string());
    }
    Authorization::<Bearer>::decode(&mut headers.get_all(axum::http::header::AUTHORIZATION).iter())
        .ok()
        .map(|auth| auth.token().to_string())
}

/// Request-scoped correlation-id logging, the same shape as
/// `web.rs::request_logging_middleware`.
async fn request_logging_middleware(
    req: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

/// Reports 5xx responses to Sentry, the same shape as
/// `web.rs::sentry_error_middleware`. A no-op when `SENTRY_DSN` is unset,
/// since `sentry::capture_message` is harmless without an initialized hub.
async fn sentry_error_middleware(req: axum::extract::Request, next: middleware::Next) -> axum::response::Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    if response.status().is_server_error() {
        let status = response.status();
        sentry::configure_scope(|scope| {
            scope.set_tag("http.method", method.as_str());
            scope.set_tag("http.url", uri.to_string());
            scope.set_tag("http.status_code", status.as_u16().to_string());
        });
        sentry::capture_message(
            &format!("HTTP {} error on {} {}", status.as_u16(), method, uri),
            sentry::Level::Error,
        );
    }

    response
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::permissive().allow_methods([
        Method::GET,
        Method::POST,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    let api = Router::new()
        .route("/flights", get(handlers::get_flights))
        .route("/flights/route", get(handlers::get_route))
        .route("/flights/{icao}/trajectory", get(handlers::get_trajectory))
        .route("/flights/{icao}", get(handlers::get_flight_by_icao))
        .route("/elevation", get(handlers::get_elevation))
        .route("/cache/stats", get(handlers::get_cache_stats))
        .route("/cache", delete(handlers::clear_cache))
        .route("/opensky/reconnect", post(handlers::reconnect))
        .route("/opensky/credentials", post(handlers::create_session))
        .route("/opensky/credentials", delete(handlers::delete_session))
        .route("/opensky/status", get(handlers::opensky_status));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(crate::ws::upgrade_handler))
        .nest("/api", api)
        .layer(cors)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(sentry_error_middleware))
        .with_state(state)
}
