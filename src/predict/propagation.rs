use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};

use crate::predict::error::{CatalogError, PredictError};
use crate::predict::ground_station::{ecef_to_geodetic, GroundStation, EARTH_ROTATION_RAD_S};
use crate::predict::types::{Observation, StateVector};

/// Source of satellite observations for a ground station.
///
/// The pass search and the tracking loop only ever see a satellite through
/// this trait, so the orbital propagator stays swappable.
pub trait Ephemeris {
    fn name(&self) -> &str;

    fn observe(
        &self,
        station: &GroundStation,
        at: DateTime<Utc>,
    ) -> Result<Observation, PredictError>;
}

impl<T: Ephemeris + ?Sized> Ephemeris for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn observe(
        &self,
        station: &GroundStation,
        at: DateTime<Utc>,
    ) -> Result<Observation, PredictError> {
        (**self).observe(station, at)
    }
}

/// SGP4/SDP4-propagated satellite built from a two-line element set.
pub struct Satellite {
    name: String,
    elements: Elements,
    constants: Constants,
}

impl Satellite {
    pub fn from_tle(name: &str, line1: &str, line2: &str) -> Result<Self, CatalogError> {
        let invalid = |message: String| CatalogError::InvalidElements {
            name: name.to_string(),
            message,
        };
        let elements = Elements::from_tle(
            Some(name.to_string()),
            line1.trim_end().as_bytes(),
            line2.trim_end().as_bytes(),
        )
        .map_err(|e| invalid(e.to_string()))?;
        let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            elements,
            constants,
        })
    }

    pub fn norad_id(&self) -> u64 {
        self.elements.norad_id
    }

    pub fn propagate(&self, at: DateTime<Utc>) -> Result<StateVector, PredictError> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;
        let prediction = self.constants.propagate(minutes)?;

        Ok(StateVector {
            position_km: prediction.position,
            velocity_km_s: prediction.velocity,
        })
    }
}

impl Ephemeris for Satellite {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(
        &self,
        station: &GroundStation,
        at: DateTime<Utc>,
    ) -> Result<Observation, PredictError> {
        let state = self.propagate(at)?;
        Ok(look_angle(&state, station, at))
    }
}

pub fn sidereal_time(at: DateTime<Utc>) -> f64 {
    sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&at.naive_utc()))
}

/// Topocentric look angles, range rate and sub-satellite point for an
/// inertial state at `at`.
pub fn look_angle(state: &StateVector, station: &GroundStation, at: DateTime<Utc>) -> Observation {
    let sidereal = sidereal_time(at);

    let sat_ecef = teme_to_ecef_position(state.position_km, sidereal);
    let sat_vel_ecef = teme_to_ecef_velocity(state.position_km, state.velocity_km_s, sidereal);
    let sta_ecef = station.position_ecef_km();

    let dr = [
        sat_ecef[0] - sta_ecef[0],
        sat_ecef[1] - sta_ecef[1],
        sat_ecef[2] - sta_ecef[2],
    ];
    let range_km = norm(dr);

    let enu = ecef_to_enu(dr, station.lat_rad(), station.lon_rad());
    let azimuth = enu.0.atan2(enu.1).to_degrees().rem_euclid(360.0);
    let elevation = if range_km > 0.0 {
        (enu.2 / range_km).clamp(-1.0, 1.0).asin().to_degrees()
    } else {
        0.0
    };

    // The station is at rest in the Earth-fixed frame.
    let range_rate_km_s = if range_km > 0.0 {
        (sat_vel_ecef[0] * dr[0] + sat_vel_ecef[1] * dr[1] + sat_vel_ecef[2] * dr[2]) / range_km
    } else {
        0.0
    };

    let (lat, lon, alt_km) = ecef_to_geodetic(sat_ecef);

    Observation {
        timestamp: at,
        position_km: state.position_km,
        velocity_km_s: state.velocity_km_s,
        speed_km_s: norm(state.velocity_km_s),
        latitude_deg: lat.to_degrees(),
        longitude_deg: lon.to_degrees(),
        altitude_km: alt_km,
        azimuth_deg: azimuth,
        elevation_deg: elevation,
        range_km,
        range_rate_km_s,
    }
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn teme_to_ecef_velocity(pos_teme: [f64; 3], vel_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let pos = teme_to_ecef_position(pos_teme, gmst);
    let rotated = teme_to_ecef_position(vel_teme, gmst);
    [
        rotated[0] + EARTH_ROTATION_RAD_S * pos[1],
        rotated[1] - EARTH_ROTATION_RAD_S * pos[0],
        rotated[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    const ISS_LINE1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_LINE2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    fn ecef_to_teme(ecef: [f64; 3], gmst: f64) -> [f64; 3] {
        teme_to_ecef_position(ecef, -gmst)
    }

    fn station() -> GroundStation {
        GroundStation::new(50.88, -114.29, 1250.0)
    }

    fn offset_state(at: DateTime<Utc>, east: f64, north: f64, up: f64) -> StateVector {
        let station = station();
        let (lat, lon) = (station.lat_rad(), station.lon_rad());
        let dr = [
            -lon.sin() * east - lat.sin() * lon.cos() * north + lat.cos() * lon.cos() * up,
            lon.cos() * east - lat.sin() * lon.sin() * north + lat.cos() * lon.sin() * up,
            lat.cos() * north + lat.sin() * up,
        ];
        let sta = station.position_ecef_km();
        let ecef = [sta[0] + dr[0], sta[1] + dr[1], sta[2] + dr[2]];
        StateVector {
            position_km: ecef_to_teme(ecef, sidereal_time(at)),
            velocity_km_s: [0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn overhead_satellite_is_at_zenith() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let obs = look_angle(&offset_state(at, 0.0, 0.0, 500.0), &station(), at);

        assert_abs_diff_eq!(obs.elevation_deg, 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(obs.range_km, 500.0, epsilon = 1e-6);
        assert_abs_diff_eq!(obs.latitude_deg, 50.88, epsilon = 1e-6);
        assert_abs_diff_eq!(obs.longitude_deg, -114.29, epsilon = 1e-6);
        assert_abs_diff_eq!(obs.altitude_km, 501.25, epsilon = 1e-3);
    }

    #[test]
    fn azimuth_follows_compass_bearing() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let east = look_angle(&offset_state(at, 800.0, 0.0, 800.0), &station(), at);
        assert_abs_diff_eq!(east.azimuth_deg, 90.0, epsilon = 1e-6);
        assert_abs_diff_eq!(east.elevation_deg, 45.0, epsilon = 1e-6);

        let west = look_angle(&offset_state(at, -500.0, 0.0, 0.0), &station(), at);
        assert_abs_diff_eq!(west.azimuth_deg, 270.0, epsilon = 1e-6);
        assert_abs_diff_eq!(west.elevation_deg, 0.0, epsilon = 1e-6);

        let south = look_angle(&offset_state(at, 0.0, -300.0, -10.0), &station(), at);
        assert_abs_diff_eq!(south.azimuth_deg, 180.0, epsilon = 1e-6);
        assert!(south.elevation_deg < 0.0);
    }

    #[test]
    fn stationary_point_in_earth_frame_has_no_range_rate() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut state = offset_state(at, 300.0, 400.0, 600.0);
        // Co-rotating with the Earth: v = omega x r in the inertial frame.
        let r = state.position_km;
        state.velocity_km_s = [
            -EARTH_ROTATION_RAD_S * r[1],
            EARTH_ROTATION_RAD_S * r[0],
            0.0,
        ];
        let obs = look_angle(&state, &station(), at);
        assert_abs_diff_eq!(obs.range_rate_km_s, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn sgp4_satellite_observes() {
        let iss = Satellite::from_tle("ISS (ZARYA)", ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(iss.name(), "ISS (ZARYA)");
        assert_eq!(iss.norad_id(), 25544);

        let at = Utc.with_ymd_and_hms(2020, 7, 13, 12, 0, 0).unwrap();
        let obs = iss.observe(&station(), at).unwrap();
        assert!(obs.altitude_km > 350.0 && obs.altitude_km < 480.0);
        assert!(obs.speed_km_s > 7.0 && obs.speed_km_s < 8.0);
        assert!((0.0..360.0).contains(&obs.azimuth_deg));
        assert!(obs.range_rate_km_s.abs() < 8.0);
    }

    #[test]
    fn malformed_elements_are_rejected() {
        let err = Satellite::from_tle("BROKEN", "1 25544U garbage", ISS_LINE2);
        assert!(matches!(err, Err(CatalogError::InvalidElements { .. })));
    }
}
