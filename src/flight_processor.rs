//! Pure transformation from raw provider state vectors into client-facing
//! `ProcessedFlight` records.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::geo::{bearing_deg, distance_km, elevation_deg, gps_to_local};
use crate::models::{GpsPosition, ProcessedFlight, RawStateVector, UserLocation};

/// Callsign's first-two-character IATA-style prefix -> display airline name.
/// Not exhaustive; covers the carriers most likely to appear in test
/// fixtures and common European airspace.
static AIRLINE_PREFIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("OK", "CSA Czech Airlines"),
        ("LH", "Lufthansa"),
        ("BA", "British Airways"),
        ("FR", "Ryanair"),
        ("U2", "easyJet"),
        ("W6", "Wizz Air"),
        ("AF", "Air France"),
        ("KL", "KLM"),
        ("EK", "Emirates"),
        ("AA", "American Airlines"),
        ("UA", "United Airlines"),
        ("DL", "Delta Air Lines"),
        ("LX", "Swiss International Air Lines"),
        ("OS", "Austrian Airlines"),
        ("TK", "Turkish Airlines"),
    ])
});

fn resolve_airline(callsign: &str) -> String {
    if callsign.len() < 2 {
        return "Unknown".to_string();
    }
    let prefix = &callsign[..2];
    AIRLINE_PREFIXES
        .get(prefix)
        .map(|name| name.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Transforms one raw state vector into a `ProcessedFlight` relative to
/// `user`, or `None` if it is dropped by one of the filtering rules
/// (missing position, missing both altitudes, or outside `radius_km`).
pub fn process_state_vector(raw: &RawStateVector, user: &UserLocation, radius_km: f64) -> Option<ProcessedFlight> {
    let latitude = raw.latitude?;
    let longitude = raw.longitude?;

    if raw.baro_altitude.is_none() && raw.geo_altitude.is_none() {
        return None;
    }
    let altitude = raw.baro_altitude.or(raw.geo_altitude).unwrap();

    let distance = distance_km(user.latitude, user.longitude, latitude, longitude);
    if distance > radius_km {
        return None;
    }

    let gps = GpsPosition {
        latitude,
        longitude,
        altitude,
    };
    let position = gps_to_local(user, latitude, longitude, altitude);
    let elevation = elevation_deg(user.altitude, altitude, distance);
    let azimuth = bearing_deg(user.latitude, user.longitude, latitude, longitude);

    let callsign = raw.callsign.as_deref().unwrap_or("").trim().to_string();
    let callsign = if callsign.is_empty() { "UNKNOWN".to_string() } else { callsign };
    let airline = resolve_airline(&callsign);

    let last_update = raw
        .time_position
        .map(|t| t * 1000)
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    Some(ProcessedFlight {
        id: raw.icao24.clone(),
        icao24: raw.icao24.clone(),
        callsign,
        airline,
        gps,
        position,
        velocity: raw.velocity.unwrap_or(0.0),
        heading: raw.true_track.unwrap_or(0.0),
        distance,
        elevation,
        azimuth,
        on_ground: raw.on_ground,
        last_update,
    })
}

/// Transforms a batch, dropping rows that fail the filtering rules.
pub fn process_state_vectors(raws: &[RawStateVector], user: &UserLocation, radius_km: f64) -> Vec<ProcessedFlight> {
    raws.iter()
        .filter_map(|raw| process_state_vector(raw, user, radius_km))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserLocation = UserLocation {
        latitude: 50.0755,
        longitude: 14.4378,
        altitude: 0.0,
        name: None,
    };

    fn sample_raw() -> RawStateVector {
        RawStateVector {
            icao24: "abc123".to_string(),
            callsign: Some("LH1234  ".to_string()),
            origin_country: "Germany".to_string(),
            time_position: Some(1_700_000_000),
            last_contact: 1_700_000_000,
            longitude: Some(14.50),
            latitude: Some(50.10),
            baro_altitude: None,
            geo_altitude: Some(10000.0),
            on_ground: false,
            velocity: Some(250.0),
            true_track: Some(90.0),
            vertical_rate: Some(0.0),
            squawk: None,
            position_source: Some(0),
        }
    }

    #[test]
    fn processes_the_spec_end_to_end_scenario() {
        let flight = process_state_vector(&sample_raw(), &USER, 50.0).unwrap();
        assert_eq!(flight.callsign, "LH1234");
        assert_eq!(flight.airline, "Lufthansa");
        assert!((flight.distance - 5.9).abs() < 0.5, "distance was {}", flight.distance);
        assert!((flight.azimuth - 60.0).abs() < 5.0, "azimuth was {}", flight.azimuth);
        assert!((flight.elevation - 60.0).abs() < 5.0, "elevation was {}", flight.elevation);
        assert!(flight.position.z > 0.0);
    }

    #[test]
    fn drops_rows_without_position() {
        let mut raw = sample_raw();
        raw.latitude = None;
        assert!(process_state_vector(&raw, &USER, 50.0).is_none());
    }

    #[test]
    fn drops_rows_missing_both_altitudes() {
        let mut raw = sample_raw();
        raw.baro_altitude = None;
        raw.geo_altitude = None;
        assert!(process_state_vector(&raw, &USER, 50.0).is_none());
    }

    #[test]
    fn keeps_rows_with_only_geo_altitude() {
        let raw = sample_raw();
        assert!(process_state_vector(&raw, &USER, 50.0).is_some());
    }

    #[test]
    fn drops_rows_outside_radius() {
        let raw = sample_raw();
        assert!(process_state_vector(&raw, &USER, 1.0).is_none());
    }

    #[test]
    fn prefers_baro_altitude_over_geo() {
        let mut raw = sample_raw();
        raw.baro_altitude = Some(9500.0);
        let flight = process_state_vector(&raw, &USER, 50.0).unwrap();
        assert_eq!(flight.gps.altitude, 9500.0);
    }

    #[test]
    fn empty_callsign_falls_back_to_unknown_markers() {
        let mut raw = sample_raw();
        raw.callsign = Some("   ".to_string());
        let flight = process_state_vector(&raw, &USER, 50.0).unwrap();
        assert_eq!(flight.callsign, "UNKNOWN");
        assert_eq!(flight.airline, "Unknown");
    }

    #[test]
    fn unknown_prefix_resolves_to_unknown_airline() {
        let mut raw = sample_raw();
        raw.callsign = Some("ZZ999".to_string());
        let flight = process_state_vector(&raw, &USER, 50.0).unwrap();
        assert_eq!(flight.airline, "Unknown");
    }
}
