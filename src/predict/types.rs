use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inertial (TEME) state of a satellite as produced by the propagator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub position_km: [f64; 3],
    pub velocity_km_s: [f64; 3],
}

/// Snapshot of a satellite as seen from the ground station at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub position_km: [f64; 3],
    pub velocity_km_s: [f64; 3],
    pub speed_km_s: f64,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub range_km: f64,
    pub range_rate_km_s: f64,
}

/// Filters applied while scanning a catalog for passes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PassCriteria {
    pub min_altitude_km: f64,
    pub max_altitude_km: f64,
    pub min_minutes: f64,
    pub max_minutes: f64,
    pub min_elevation_deg: f64,
    pub max_elevation_deg: f64,
    pub pattern: Option<String>,
    pub ignore_case: bool,
    pub with_constellations: bool,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            min_altitude_km: 0.0,
            max_altitude_km: 100_000.0,
            min_minutes: 0.0,
            max_minutes: 1440.0,
            min_elevation_deg: 0.0,
            max_elevation_deg: 90.0,
            pattern: None,
            ignore_case: false,
            with_constellations: true,
        }
    }
}

/// Statistics gathered by walking one pass from rise to set.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    pub duration_minutes: f64,
    pub minutes_above_0: f64,
    pub minutes_above_30: f64,
    pub max_elevation_deg: f64,
    pub max_altitude_km: f64,
    pub rise_azimuth_deg: f64,
    pub rise_time: DateTime<Utc>,
}

/// A predicted satellite pass
#[derive(Debug, Clone, Serialize)]
pub struct Pass {
    pub satellite: String,
    pub minutes_away: f64,
    pub max_elevation_deg: f64,
    pub max_altitude_km: f64,
    pub duration_minutes: f64,
    pub rise_azimuth_deg: f64,
    pub rise_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    SoonestFirst,
    LatestFirst,
}
