//! Core data types shared across the aggregation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed aircraft at one instant, as shaped by the upstream provider.
/// Ephemeral: constructed on fetch, discarded once `FlightProcessor` runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStateVector {
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: String,
    pub time_position: Option<i64>,
    pub last_contact: i64,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub baro_altitude: Option<f64>,
    pub geo_altitude: Option<f64>,
    pub on_ground: bool,
    pub velocity: Option<f64>,
    pub true_track: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub squawk: Option<String>,
    pub position_source: Option<u8>,
}

/// One raw historical track point, as returned by the tracks endpoint:
/// `[timestampSec, lat, lon, alt, heading, onGround]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTrackPoint {
    pub time_sec: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

/// Observer anchor for local-tangent-plane conversion. Supplied per request,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

/// Local East-North-Up tangent-plane position, metres. `x` = north, `y` = up,
/// `z` = east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// GPS coordinate with altitude in metres above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Client-facing record for one aircraft relative to one user location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFlight {
    pub id: String,
    pub icao24: String,
    pub callsign: String,
    pub airline: String,
    pub gps: GpsPosition,
    pub position: LocalPosition,
    pub velocity: f64,
    pub heading: f64,
    pub distance: f64,
    pub elevation: f64,
    pub azimuth: f64,
    pub on_ground: bool,
    pub last_update: i64,
}

/// One point on a flight's historical path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectorySample {
    pub timestamp: i64,
    pub gps: GpsPosition,
    pub position: LocalPosition,
}

/// Scheduled/estimated/actual endpoint metadata for one leg of a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEndpoint {
    pub airport: Option<String>,
    pub iata: Option<String>,
    pub icao: Option<String>,
    pub scheduled: Option<DateTime<Utc>>,
    pub estimated: Option<DateTime<Utc>>,
    pub actual: Option<DateTime<Utc>>,
    pub gate: Option<String>,
    pub terminal: Option<String>,
    pub delay_minutes: Option<i64>,
}

/// Callsign metadata resolved via the route-metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    pub callsign: String,
    pub flight_number: Option<String>,
    pub airline: Option<String>,
    pub status: Option<String>,
    pub origin: Option<RouteEndpoint>,
    pub destination: Option<RouteEndpoint>,
    pub updated_at: DateTime<Utc>,
}

/// A BYOK binding: session identifier, credential pair, and lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub client_id: String,
    pub client_secret: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(client_id: String, client_secret: String) -> Self {
        let created_at = Utc::now();
        Self {
            client_id,
            client_secret,
            created_at,
            expires_at: created_at + chrono::Duration::hours(24),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// OAuth artefact owned by exactly one `TokenManager`.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_session_lasts_24_hours() {
        let session = Session::new("client".to_string(), "secret".to_string());
        assert!(!session.is_expired(session.created_at));
        assert!(!session.is_expired(session.created_at + chrono::Duration::hours(23)));
        assert!(session.is_expired(session.created_at + chrono::Duration::hours(24)));
        assert!(session.is_expired(session.created_at + chrono::Duration::hours(25)));
    }
}
