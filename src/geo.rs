//! Pure geometric functions: great-circle distance, bearing, elevation angle,
//! GPS-to-local-tangent-plane conversion, and dead-reckoning extrapolation.
//!
//! All angles are degrees at the interface; internal trig uses radians.
//! Grounded on the Haversine/bearing formulas used throughout the example
//! pack's own flight-tracking geo modules, generalized with the local-plane
//! and extrapolation operations this crate's pipeline needs.

use crate::models::{GpsPosition, LocalPosition, UserLocation};

/// Mean Earth radius, kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Metres per degree of latitude, used by dead-reckoning extrapolation.
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle (Haversine) distance between two points, kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().clamp(0.0, 1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Initial great-circle bearing from point 1 to point 2, normalised to
/// `[0, 360)` degrees clockwise from true north.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2_r.cos();
    let x = lat1_r.cos() * lat2_r.sin() - lat1_r.sin() * lat2_r.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Vertical angle above the local horizon, clamped to `[0, 90]` — sub-horizon
/// targets are reported at the horizon rather than as negative angles.
pub fn elevation_deg(user_alt: f64, target_alt: f64, distance_km: f64) -> f64 {
    let rise = target_alt - user_alt;
    let run_m = distance_km * 1000.0;
    if run_m <= 0.0 {
        return if rise > 0.0 { 90.0 } else { 0.0 };
    }
    (rise / run_m).atan().to_degrees().max(0.0)
}

/// Convert a GPS target into the local East-North-Up tangent plane centred
/// on `user`. `+X` = north, `+Y` = up, `+Z` = east.
pub fn gps_to_local(user: &UserLocation, target_lat: f64, target_lon: f64, target_alt: f64) -> LocalPosition {
    let dist_km = distance_km(user.latitude, user.longitude, target_lat, target_lon);
    let bearing = bearing_deg(user.latitude, user.longitude, target_lat, target_lon).to_radians();
    let dist_m = dist_km * 1000.0;

    LocalPosition {
        x: dist_m * bearing.cos(),
        y: target_alt - user.altitude,
        z: dist_m * bearing.sin(),
    }
}

/// Minimal state needed to dead-reckon a flight's position forward in time.
/// The server keeps this off its hot path (§9) — upstream-timestamped
/// positions are returned as-is; a client may call this to extrapolate
/// visually between updates.
#[derive(Debug, Clone, Copy)]
pub struct ExtrapolationInput {
    pub gps: GpsPosition,
    pub velocity: f64,
    pub heading_deg: f64,
    pub on_ground: bool,
}

/// Advance a flight's GPS position by dead reckoning. Altitude is unchanged.
/// Returns the input position unmodified for grounded aircraft, stationary
/// aircraft, or `seconds <= 0`.
pub fn extrapolate(flight: &ExtrapolationInput, seconds: f64) -> GpsPosition {
    if flight.on_ground || flight.velocity <= 0.0 || seconds <= 0.0 {
        return flight.gps;
    }

    let distance_m = flight.velocity * seconds;
    let heading_r = flight.heading_deg.to_radians();

    let dlat_m = distance_m * heading_r.cos();
    let dlon_m = distance_m * heading_r.sin();

    let lat_cos = flight.gps.latitude.to_radians().cos();
    let lat_cos = if lat_cos.abs() < 1e-6 {
        1e-6_f64.copysign(lat_cos)
    } else {
        lat_cos
    };

    GpsPosition {
        latitude: flight.gps.latitude + dlat_m / METERS_PER_DEGREE_LAT,
        longitude: flight.gps.longitude + dlon_m / (METERS_PER_DEGREE_LAT * lat_cos),
        altitude: flight.gps.altitude,
    }
}

/// Bounding box `(lamin, lomin, lamax, lomax)` around `user` for a query
/// radius in kilometres.
pub fn bounding_box(user: &UserLocation, radius_km: f64) -> (f64, f64, f64, f64) {
    let lat_delta = radius_km / 111.0;
    let lat_cos = user.latitude.to_radians().cos();
    let lat_cos = if lat_cos.abs() < 1e-6 {
        1e-6_f64.copysign(lat_cos)
    } else {
        lat_cos
    };
    let lon_delta = radius_km / (111.0 * lat_cos);

    (
        user.latitude - lat_delta,
        user.longitude - lon_delta,
        user.latitude + lat_delta,
        user.longitude + lon_delta,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRAGUE: UserLocation = UserLocation {
        latitude: 50.0755,
        longitude: 14.4378,
        altitude: 0.0,
        name: None,
    };

    #[test]
    fn distance_zero_for_identical_points() {
        assert!(distance_km(50.0, 14.0, 50.0, 14.0) < 1e-9);
    }

    #[test]
    fn distance_known_pair_is_roughly_correct() {
        // Prague to Vienna is roughly 250km.
        let d = distance_km(50.0755, 14.4378, 48.2082, 16.3738);
        assert!(d > 200.0 && d < 260.0, "distance was {d}");
    }

    #[test]
    fn bearing_is_normalised_to_0_360() {
        let b = bearing_deg(50.0, 14.0, 49.0, 13.0);
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn elevation_is_never_negative() {
        let e = elevation_deg(1000.0, 0.0, 10.0);
        assert_eq!(e, 0.0);
    }

    #[test]
    fn elevation_increases_with_altitude() {
        let low = elevation_deg(0.0, 1000.0, 10.0);
        let high = elevation_deg(0.0, 5000.0, 10.0);
        assert!(high > low);
    }

    #[test]
    fn gps_to_local_east_positive_z() {
        // A point due east should have positive Z and roughly zero X.
        let pos = gps_to_local(&PRAGUE, PRAGUE.latitude, PRAGUE.longitude + 0.5, 0.0);
        assert!(pos.z > 0.0);
        assert!(pos.x.abs() < pos.z);
    }

    #[test]
    fn gps_to_local_round_trips_bearing_and_distance() {
        let target_lat = 50.50;
        let target_lon = 14.90;
        let pos = gps_to_local(&PRAGUE, target_lat, target_lon, 0.0);

        let dist_m = (pos.x.powi(2) + pos.z.powi(2)).sqrt();
        let recovered_bearing = pos.z.atan2(pos.x).to_degrees().rem_euclid(360.0);

        let expected_dist_m = distance_km(PRAGUE.latitude, PRAGUE.longitude, target_lat, target_lon) * 1000.0;
        let expected_bearing = bearing_deg(PRAGUE.latitude, PRAGUE.longitude, target_lat, target_lon);

        assert!((dist_m - expected_dist_m).abs() < 1.0);
        assert!((recovered_bearing - expected_bearing).abs() < 0.01);
    }

    #[test]
    fn extrapolate_identity_at_zero_seconds() {
        let input = ExtrapolationInput {
            gps: GpsPosition {
                latitude: 50.0,
                longitude: 14.0,
                altitude: 5000.0,
            },
            velocity: 200.0,
            heading_deg: 90.0,
            on_ground: false,
        };
        let result = extrapolate(&input, 0.0);
        assert_eq!(result, input.gps);
    }

    #[test]
    fn extrapolate_skips_grounded_aircraft() {
        let input = ExtrapolationInput {
            gps: GpsPosition {
                latitude: 50.0,
                longitude: 14.0,
                altitude: 300.0,
            },
            velocity: 5.0,
            heading_deg: 90.0,
            on_ground: true,
        };
        let result = extrapolate(&input, 60.0);
        assert_eq!(result, input.gps);
    }

    #[test]
    fn extrapolate_moves_east_for_heading_90() {
        let input = ExtrapolationInput {
            gps: GpsPosition {
                latitude: 50.0,
                longitude: 14.0,
                altitude: 5000.0,
            },
            velocity: 200.0,
            heading_deg: 90.0,
            on_ground: false,
        };
        let result = extrapolate(&input, 60.0);
        assert!(result.longitude > input.gps.longitude);
        assert!((result.latitude - input.gps.latitude).abs() < 1e-6);
    }

    #[test]
    fn bounding_box_is_centered_on_user() {
        let (lamin, lomin, lamax, lomax) = bounding_box(&PRAGUE, 100.0);
        assert!(lamin < PRAGUE.latitude && lamax > PRAGUE.latitude);
        assert!(lomin < PRAGUE.longitude && lomax > PRAGUE.longitude);
    }
}
