//! Thin orchestrator tying the cache, session store, upstream client, route
//! client, and trajectory sampler together.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::UpstreamError;
use crate::flight_processor::process_state_vectors;
use crate::geo::bounding_box;
use crate::models::{ProcessedFlight, TrajectorySample, UserLocation};
use crate::session::SessionStore;
use crate::token_manager::TokenManager;
use crate::trajectory::sample_trajectory;
use crate::upstream::UpstreamFlightClient;

const FLIGHTS_TTL: Duration = Duration::from_secs(15);
const FLIGHT_BY_ICAO_TTL: Duration = Duration::from_secs(30);
const TRAJECTORY_TTL: Duration = Duration::from_secs(60);

/// Europe-spanning anchor used by `getFlightByIcao` when no session-specific location is known.
const DEFAULT_ANCHOR: UserLocation = UserLocation {
    latitude: 50.0,
    longitude: 10.0,
    altitude: 0.0,
    name: None,
};
const DEFAULT_ANCHOR_RADIUS_KM: f64 = 1000.0;

/// Result of an orchestrated query: the data the caller asked for, plus an
/// optional structured description of a degraded (but non-fatal) upstream
/// call. `FlightService` holds no mutable "last error" state itself — the
/// error is threaded through the return value per call instead.
pub struct QueryResult<T> {
    pub data: T,
    pub error: Option<UpstreamError>,
}

pub struct FlightService {
    cache: Arc<Cache>,
    sessions: Arc<SessionStore>,
    anonymous_token_manager: Option<Arc<TokenManager>>,
    upstream: UpstreamFlightClient,
}

impl FlightService {
    pub fn new(
        cache: Arc<Cache>,
        sessions: Arc<SessionStore>,
        anonymous_token_manager: Option<Arc<TokenManager>>,
        upstream: UpstreamFlightClient,
    ) -> Self {
        Self {
            cache,
            sessions,
            anonymous_token_manager,
            upstream,
        }
    }

    fn resolve_token_manager(&self, session_token: Option<&str>) -> Option<Arc<TokenManager>> {
        if let Some(token) = session_token {
            if let Some(entry) = self.sessions.resolve(token) {
                return Some(entry.token_manager.clone());
            }
        }
        self.anonymous_token_manager.clone()
    }

    pub async fn get_flights_in_area(
        &self,
        user: &UserLocation,
        radius_km: f64,
        session_token: Option<&str>,
    ) -> QueryResult<Vec<ProcessedFlight>> {
        let cache_key = format!(
            "flights_{:.4}_{:.4}_{}",
            user.latitude, user.longitude, radius_km
        );

        if let Some(Some(cached)) = self.cache.get::<Vec<ProcessedFlight>>(&cache_key).await {
            return QueryResult { data: cached, error: None };
        }

        let token_manager = self.resolve_token_manager(session_token);
        let bbox = bounding_box(user, radius_km);

        match self
            .upstream
            .fetch_states(bbox, token_manager.as_deref())
            .await
        {
            Ok(raw) => {
                let flights = process_state_vectors(&raw, user, radius_km);
                self.cache.set(&cache_key, Some(&flights), FLIGHTS_TTL).await;
                QueryResult { data: flights, error: None }
            }
            Err(upstream_error) => QueryResult {
                data: Vec::new(),
                error: Some(upstream_error),
            },
        }
    }

    pub async fn get_flight_by_icao(
        &self,
        icao: &str,
        session_token: Option<&str>,
    ) -> QueryResult<Option<ProcessedFlight>> {
        let cache_key = format!("flight_by_icao_{}", icao.to_lowercase());

        if let Some(Some(cached)) = self.cache.get::<ProcessedFlight>(&cache_key).await {
            return QueryResult {
                data: Some(cached),
                error: None,
            };
        }

        let token_manager = self.resolve_token_manager(session_token);
        let bbox = bounding_box(&DEFAULT_ANCHOR, DEFAULT_ANCHOR_RADIUS_KM);

        match self.upstream.fetch_states(bbox, token_manager.as_deref()).await {
            Ok(raw) => {
                let flights = process_state_vectors(&raw, &DEFAULT_ANCHOR, DEFAULT_ANCHOR_RADIUS_KM);
                let found = flights.into_iter().find(|f| f.icao24.eq_ignore_ascii_case(icao));
                if let Some(flight) = &found {
                    self.cache.set(&cache_key, Some(flight), FLIGHT_BY_ICAO_TTL).await;
                }
                QueryResult { data: found, error: None }
            }
            Err(upstream_error) => QueryResult {
                data: None,
                error: Some(upstream_error),
            },
        }
    }

    pub async fn get_flight_trajectory(
        &self,
        icao: &str,
        user: &UserLocation,
        session_token: Option<&str>,
    ) -> QueryResult<Vec<TrajectorySample>> {
        let minute_bucket = chrono::Utc::now().timestamp() / 60;
        let cache_key = format!("trajectory_{}_{}", icao.to_lowercase(), minute_bucket);

        if let Some(Some(cached)) = self.cache.get::<Vec<TrajectorySample>>(&cache_key).await {
            return QueryResult { data: cached, error: None };
        }

        let token_manager = self.resolve_token_manager(session_token);

        match self.upstream.fetch_track(icao, token_manager.as_deref()).await {
            Ok(raw) => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                let samples = sample_trajectory(&raw, user, now_ms);
                self.cache.set(&cache_key, Some(&samples), TRAJECTORY_TTL).await;
                QueryResult { data: samples, error: None }
            }
            Err(upstream_error) => QueryResult {
                data: Vec::new(),
                error: Some(upstream_error),
            },
        }
    }
}
