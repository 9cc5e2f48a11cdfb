use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{extract_session_token, AppState};
use crate::error::ApiError;
use crate::models::{ProcessedFlight, UserLocation};
use crate::rate_limiter::{ANONYMOUS_BYOK_OFF, ANONYMOUS_BYOK_ON, BYOK_AUTHENTICATED};

fn reject_nan(name: &str, value: f64) -> Result<f64, ApiError> {
    if value.is_nan() {
        Err(ApiError::validation(format!("{name} must be a number")))
    } else {
        Ok(value)
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Deserialize)]
pub struct FlightsQuery {
    lat: f64,
    lon: f64,
    radius: f64,
}

#[derive(Serialize)]
struct FlightsResponse {
    success: bool,
    data: Vec<ProcessedFlight>,
    count: usize,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<serde_json::Value>,
}

/// Resolves the rate-limit tier for a request per the following
/// precedence: BYOK disabled always uses Anonymous(off); otherwise a
/// resolvable session is BYOK-authenticated; otherwise Anonymous(on).
fn resolve_tier(state: &AppState, session_token: Option<&str>) -> crate::rate_limiter::RateLimitTier {
    if !state.config.byok_enabled {
        return ANONYMOUS_BYOK_OFF;
    }
    match session_token.map(|t| state.sessions.has(t)) {
        Some(true) => BYOK_AUTHENTICATED,
        _ => ANONYMOUS_BYOK_ON,
    }
}

fn rate_limit_identity(state: &AppState, session_token: Option<&str>, remote: &str) -> String {
    if state.config.byok_enabled {
        if let Some(token) = session_token {
            if state.sessions.has(token) {
                return format!("session:{token}");
            }
        }
    }
    format!("anon:{remote}")
}

fn check_rate_limit(state: &AppState, headers: &HeaderMap, session_token: Option<&str>) -> Result<(), ApiError> {
    let remote = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let tier = resolve_tier(state, session_token);
    let identity = rate_limit_identity(state, session_token, remote);
    let decision = state.rate_limiter.check(&identity, tier);
    if !decision.allowed {
        metrics::counter!("rate_limit_denied_total").increment(1);
        return Err(ApiError::RateLimited {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        });
    }
    Ok(())
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": now_ts(),
    }))
}

pub async fn get_flights(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<FlightsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_token = extract_session_token(&headers);
    check_rate_limit(&state, &headers, session_token.as_deref())?;

    let lat = reject_nan("lat", q.lat)?;
    let lon = reject_nan("lon", q.lon)?;
    let radius = reject_nan("radius", q.radius)?;

    let user = UserLocation {
        latitude: lat,
        longitude: lon,
        altitude: 0.0,
        name: None,
    };

    let result = state
        .flight_service
        .get_flights_in_area(&user, radius, session_token.as_deref())
        .await;

    Ok(Json(FlightsResponse {
        success: true,
        count: result.data.len(),
        data: result.data,
        timestamp: now_ts(),
        error: result.error.map(|e| serde_json::to_value(e).unwrap_or(json!({}))),
    }))
}

pub async fn get_flight_by_icao(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(icao): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_token = extract_session_token(&headers);
    check_rate_limit(&state, &headers, session_token.as_deref())?;

    if icao.len() != 6 {
        return Err(ApiError::validation("icao must be exactly 6 characters"));
    }

    let result = state.flight_service.get_flight_by_icao(&icao, session_token.as_deref()).await;

    match result.data {
        Some(flight) => Ok(Json(json!({
            "success": true,
            "data": flight,
            "timestamp": now_ts(),
        }))
        .into_response()),
        None => Err(ApiError::not_found("flight not found")),
    }
}

#[derive(Deserialize)]
pub struct TrajectoryQuery {
    lat: f64,
    lon: f64,
    #[serde(default)]
    alt: Option<f64>,
}

pub async fn get_trajectory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(icao): Path<String>,
    Query(q): Query<TrajectoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_token = extract_session_token(&headers);
    check_rate_limit(&state, &headers, session_token.as_deref())?;

    if icao.len() != 6 {
        return Err(ApiError::validation("icao must be exactly 6 characters"));
    }

    let lat = reject_nan("lat", q.lat)?;
    let lon = reject_nan("lon", q.lon)?;

    let user = UserLocation {
        latitude: lat,
        longitude: lon,
        altitude: q.alt.unwrap_or(0.0),
        name: None,
    };

    let result = state
        .flight_service
        .get_flight_trajectory(&icao, &user, session_token.as_deref())
        .await;

    Ok(Json(json!({
        "success": true,
        "data": result.data,
        "count": result.data.len(),
        "timestamp": now_ts(),
    })))
}

#[derive(Deserialize)]
pub struct RouteQuery {
    callsign: String,
}

pub async fn get_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<RouteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_token = extract_session_token(&headers);
    check_rate_limit(&state, &headers, session_token.as_deref())?;

    if q.callsign.trim().is_empty() {
        return Err(ApiError::validation("callsign is required"));
    }

    match state.route_client.resolve(&q.callsign).await {
        Some(route) => Ok(Json(json!({
            "success": true,
            "data": route,
            "timestamp": now_ts(),
        }))
        .into_response()),
        None => Err(ApiError::not_found("route not found")),
    }
}

#[derive(Deserialize)]
pub struct ElevationQuery {
    lat: f64,
    lon: f64,
}

pub async fn get_elevation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ElevationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_token = extract_session_token(&headers);
    check_rate_limit(&state, &headers, session_token.as_deref())?;

    let lat = reject_nan("lat", q.lat)?;
    let lon = reject_nan("lon", q.lon)?;

    let elevation = state
        .elevation_client
        .lookup(lat, lon)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "latitude": lat,
        "longitude": lon,
        "elevation": elevation,
        "timestamp": now_ts(),
    })))
}

pub async fn get_cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.cache.stats().await;
    Json(json!({
        "success": true,
        "cache": {
            "keys": stats.keys,
            "hits": stats.hits,
            "misses": stats.misses,
            "sets": stats.sets,
            "deletes": stats.deletes,
            "hitRate": stats.hit_rate(),
        },
        "sessions": state.sessions.len(),
        "timestamp": now_ts(),
    }))
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.cache.clear().await;
    Json(json!({ "success": true, "timestamp": now_ts() }))
}

pub async fn reconnect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session_token = extract_session_token(&headers);
    let token_manager = session_token
        .as_deref()
        .and_then(|t| state.sessions.resolve(t))
        .map(|entry| entry.token_manager.clone())
        .or_else(|| state.anonymous_token_manager.clone());

    match token_manager {
        Some(tm) => {
            tm.force_refresh()
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            Ok(Json(json!({ "success": true, "timestamp": now_ts() })))
        }
        None => Err(ApiError::validation("no credentials configured")),
    }
}

#[derive(Deserialize)]
pub struct CreateSessionBody {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(rename = "clientSecret")]
    client_secret: String,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionBody>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.config.byok_enabled {
        return Err(ApiError::validation("BYOK is not enabled"));
    }

    let session_id = state.sessions.create(body.client_id, body.client_secret);
    let entry = state.sessions.resolve(&session_id).expect("just created");

    entry
        .token_manager
        .get_token()
        .await
        .map_err(|_| {
            state.sessions.delete(&session_id);
            ApiError::unauthorized("invalid credentials")
        })?;

    Ok(Json(json!({ "success": true, "sessionToken": session_id })))
}

pub async fn delete_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        state.sessions.delete(&token);
    }
    Json(json!({ "success": true, "timestamp": now_ts() }))
}

pub async fn opensky_status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let session_token = extract_session_token(&headers);
    let has_session = session_token.is_some();
    let entry = session_token.as_deref().and_then(|t| state.sessions.resolve(t));
    let session_active = entry.is_some();

    let token_manager = entry
        .map(|e| e.token_manager.clone())
        .or_else(|| state.anonymous_token_manager.clone());
    let token_status = match &token_manager {
        Some(tm) => Some(tm.status().await),
        None => None,
    };

    Json(json!({
        "success": true,
        "byokEnabled": state.config.byok_enabled,
        "hasSession": has_session,
        "sessionActive": session_active,
        "tokenStatus": token_status,
    }))
}
