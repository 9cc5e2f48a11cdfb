//! Row-indexed parsing of the states endpoint's positional array format,
//! adapted from the manual `Deserialize` approach the `opensky-network`
//! example crate uses for its own `StateVector`, but implemented as a plain
//! parse function over `serde_json::Value` since this provider's row layout
//! (below) differs from that crate's field count and ordering.
//!
//! Row layout, by index:
//! `[icao24, callsign, origin_country, time_position, last_contact,
//!   longitude, latitude, geo_altitude, on_ground, velocity, true_track,
//!   vertical_rate, sensors, baro_altitude, squawk, spi, position_source]`

use serde_json::Value;

use crate::models::RawStateVector;

fn as_str(v: &Value) -> Option<String> {
    v.as_str().map(|s| s.to_string())
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64()
}

fn as_bool(v: &Value) -> bool {
    v.as_bool().unwrap_or(false)
}

fn as_u8(v: &Value) -> Option<u8> {
    v.as_u64().and_then(|n| u8::try_from(n).ok())
}

/// Parses one positional row into a `RawStateVector`. Returns `None` when
/// the row is malformed or `icao24` (index 0) is null — such rows are
/// skipped rather than surfaced as an error.
pub fn parse_state_row(row: &Value) -> Option<RawStateVector> {
    let arr = row.as_array()?;
    let get = |i: usize| arr.get(i);

    let icao24 = get(0).and_then(as_str)?;
    if icao24.is_empty() {
        return None;
    }

    let callsign = get(1).and_then(as_str);
    let origin_country = get(2).and_then(as_str).unwrap_or_default();
    let time_position = get(3).and_then(as_i64);
    let last_contact = get(4).and_then(as_i64)?;
    let longitude = get(5).and_then(as_f64);
    let latitude = get(6).and_then(as_f64);
    let geo_altitude = get(7).and_then(as_f64);
    let on_ground = get(8).map(as_bool).unwrap_or(false);
    let velocity = get(9).and_then(as_f64);
    let true_track = get(10).and_then(as_f64);
    let vertical_rate = get(11).and_then(as_f64);
    let baro_altitude = get(13).and_then(as_f64);
    let squawk = get(14).and_then(as_str);
    let position_source = get(16).and_then(as_u8);

    Some(RawStateVector {
        icao24,
        callsign,
        origin_country,
        time_position,
        last_contact,
        longitude,
        latitude,
        baro_altitude,
        geo_altitude,
        on_ground,
        velocity,
        true_track,
        vertical_rate,
        squawk,
        position_source,
    })
}
