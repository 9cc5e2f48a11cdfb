//! Downsamples a raw historical track into a fixed number of time-spaced
//! control points. Pure function, no I/O.

use std::collections::BTreeMap;

use crate::geo::gps_to_local;
use crate::models::{GpsPosition, RawTrackPoint, TrajectorySample, UserLocation};

const SAMPLE_COUNT: i64 = 6;
const SAMPLE_SPACING_MS: i64 = 3 * 60 * 1000;
const MAX_LOOKBACK_MS: i64 = 60 * 60 * 1000;

struct InternalPoint {
    timestamp_ms: i64,
    latitude: f64,
    longitude: f64,
    altitude: f64,
}

/// Downsamples `points` into at most `SAMPLE_COUNT` samples spanning the
/// most recent 15 minutes, relative to `user`.
pub fn sample_trajectory(points: &[RawTrackPoint], user: &UserLocation, now_ms: i64) -> Vec<TrajectorySample> {
    let mut internal: Vec<InternalPoint> = points
        .iter()
        .filter_map(|p| {
            let timestamp_ms = p.time_sec.checked_mul(1000)?;
            if now_ms - timestamp_ms > MAX_LOOKBACK_MS {
                return None;
            }
            Some(InternalPoint {
                timestamp_ms,
                latitude: p.latitude,
                longitude: p.longitude,
                altitude: p.altitude.unwrap_or(0.0),
            })
        })
        .collect();

    internal.sort_by_key(|p| p.timestamp_ms);

    let Some(latest_point) = internal.last() else {
        return Vec::new();
    };
    let latest = latest_point.timestamp_ms;
    let earliest = latest - (SAMPLE_COUNT - 1) * SAMPLE_SPACING_MS;

    let candidates: Vec<&InternalPoint> = internal.iter().filter(|p| p.timestamp_ms >= earliest).collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut selected: BTreeMap<i64, &InternalPoint> = BTreeMap::new();

    for i in 0..SAMPLE_COUNT {
        let target = latest - (SAMPLE_COUNT - 1 - i) * SAMPLE_SPACING_MS;
        if let Some(nearest) = candidates.iter().min_by_key(|p| (p.timestamp_ms - target).abs()) {
            selected.entry(nearest.timestamp_ms).or_insert(nearest);
        }
    }

    if !selected.contains_key(&latest) {
        selected.insert(latest, latest_point);
    }

    selected
        .into_values()
        .map(|p| {
            let gps = GpsPosition {
                latitude: p.latitude,
                longitude: p.longitude,
                altitude: p.altitude,
            };
            let position = gps_to_local(user, p.latitude, p.longitude, p.altitude);
            TrajectorySample {
                timestamp: p.timestamp_ms,
                gps,
                position,
            }
        })
        .collect()
}
