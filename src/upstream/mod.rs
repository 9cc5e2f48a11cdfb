//! Upstream ADS-B data provider client.
//!
//! `reqwest::Client` built once and reused, the same "build once, reuse"
//! idiom as `flight_tracker/location.rs`'s `REALTIME_GEOCODER: OnceLock`.
//! Retry loop follows `geocoding.rs::geocode_address_with_retry`'s
//! `for attempt in 0..=max_retries` shape but with linear (not exponential)
//! backoff.

mod states;

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{UpstreamError, UpstreamErrorKind};
use crate::models::{RawStateVector, RawTrackPoint};
use crate::token_manager::TokenManager;

pub use states::parse_state_row;

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct StatesResponse {
    #[allow(dead_code)]
    time: Option<i64>,
    states: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    #[allow(dead_code)]
    icao24: Option<String>,
    path: Option<Vec<serde_json::Value>>,
}

pub struct UpstreamFlightClient {
    http: reqwest::Client,
    states_url: String,
    tracks_url: String,
}

impl UpstreamFlightClient {
    pub fn new(http: reqwest::Client, states_url: String, tracks_url: String) -> Self {
        Self {
            http,
            states_url,
            tracks_url,
        }
    }

    pub async fn fetch_states(
        &self,
        bbox: (f64, f64, f64, f64),
        token_manager: Option<&TokenManager>,
    ) -> Result<Vec<RawStateVector>, UpstreamError> {
        let (lamin, lomin, lamax, lomax) = bbox;
        let query = [
            ("lamin", lamin.to_string()),
            ("lomin", lomin.to_string()),
            ("lamax", lamax.to_string()),
            ("lomax", lomax.to_string()),
        ];

        let body = self
            .request_with_retry(&self.states_url, &query, token_manager)
            .await?;

        let parsed: StatesResponse = serde_json::from_str(&body).map_err(|e| UpstreamError {
            kind: UpstreamErrorKind::Server,
            message: format!("malformed states response: {e}"),
            status_code: None,
        })?;

        let rows = parsed.states.unwrap_or_default();
        Ok(rows.iter().filter_map(parse_state_row).collect())
    }

    pub async fn fetch_track(
        &self,
        icao24: &str,
        token_manager: Option<&TokenManager>,
    ) -> Result<Vec<RawTrackPoint>, UpstreamError> {
        let now = chrono::Utc::now().timestamp();
        let query = [("icao24", icao24.to_string()), ("time", now.to_string())];

        let body = self
            .request_with_retry(&self.tracks_url, &query, token_manager)
            .await?;

        let parsed: TracksResponse = serde_json::from_str(&body).map_err(|e| UpstreamError {
            kind: UpstreamErrorKind::Server,
            message: format!("malformed tracks response: {e}"),
            status_code: None,
        })?;

        let rows = parsed.path.unwrap_or_default();
        Ok(rows.iter().filter_map(parse_track_row).collect())
    }

    /// Up to `MAX_ATTEMPTS` outer attempts with `attempt * 1s` backoff, but
    /// only for transient failures (network errors and 5xx). Each attempt
    /// gets one inner forced-refresh-and-retry on a 401; a 401 that survives
    /// that retry escalates immediately rather than spending the remaining
    /// outer attempts on it, and 403/429 (not transient) surface on the
    /// first attempt.
    async fn request_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        token_manager: Option<&TokenManager>,
    ) -> Result<String, UpstreamError> {
        let mut last_err: Option<UpstreamError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }

            match self.try_request(url, query, token_manager, false).await {
                Ok(body) => return Ok(body),
                Err(err) if err.status_code == Some(401) && token_manager.is_some() => {
                    return self.try_request(url, query, token_manager, true).await;
                }
                Err(err) if !is_transient(&err) => return Err(err),
                Err(err) => {
                    last_err = Some(err);
                }
            }
            warn!(attempt, url, "upstream request attempt failed");
        }

        Err(last_err.unwrap_or(UpstreamError {
            kind: UpstreamErrorKind::Network,
            message: "upstream request failed with no recorded error".to_string(),
            status_code: None,
        }))
    }

    async fn try_request(
        &self,
        url: &str,
        query: &[(&str, String)],
        token_manager: Option<&TokenManager>,
        force_refresh: bool,
    ) -> Result<String, UpstreamError> {
        let auth_header = match token_manager {
            Some(tm) => {
                let token = if force_refresh {
                    tm.force_refresh().await
                } else {
                    tm.get_token().await
                };
                token.ok().map(|t| format!("Bearer {t}"))
            }
            None => None,
        };

        let mut request = self.http.get(url).query(query).timeout(REQUEST_TIMEOUT);
        if let Some(header) = auth_header {
            request = request.header("Authorization", header);
        }

        let response = request.send().await.map_err(|e| UpstreamError {
            kind: UpstreamErrorKind::Network,
            message: e.to_string(),
            status_code: None,
        })?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(|e| UpstreamError {
                kind: UpstreamErrorKind::Network,
                message: e.to_string(),
                status_code: None,
            });
        }

        let code = status.as_u16();
        let kind = match code {
            401 | 403 | 429 | 503 => UpstreamErrorKind::Opensky,
            500..=599 => UpstreamErrorKind::Server,
            _ => UpstreamErrorKind::Server,
        };

        Err(UpstreamError {
            kind,
            message: format!("upstream returned status {code}"),
            status_code: Some(code),
        })
    }
}

/// Only network errors and 5xx responses are worth retrying across outer
/// attempts; 403/429 and a 401 that survives its forced-refresh retry are
/// not transient and should surface immediately.
fn is_transient(err: &UpstreamError) -> bool {
    match err.status_code {
        None => true,
        Some(code) => (500..=599).contains(&code),
    }
}

fn parse_track_row(value: &serde_json::Value) -> Option<RawTrackPoint> {
    let arr = value.as_array()?;
    let time_sec = arr.first()?.as_i64()?;
    let latitude = arr.get(1)?.as_f64()?;
    let longitude = arr.get(2)?.as_f64()?;
    let altitude = arr.get(3).and_then(|v| v.as_f64());

    Some(RawTrackPoint {
        time_sec,
        latitude,
        longitude,
        altitude,
    })
}
