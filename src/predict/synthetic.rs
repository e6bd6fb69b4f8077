//! Analytic ephemerides for exercising the search and tracking logic without
//! a real propagator.

use chrono::{DateTime, Duration, Utc};

use crate::predict::{Ephemeris, GroundStation, Observation, PredictError};

/// One visibility window, in minutes after the satellite's epoch.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub rise: f64,
    pub set: f64,
    pub max_elevation: f64,
    pub rise_azimuth: f64,
    /// Degrees per minute the elevation keeps falling after `set`, down to
    /// the -30 degree floor. Zero drops straight to the floor.
    pub descent_rate: f64,
}

impl Window {
    pub fn new(rise: f64, set: f64, max_elevation: f64) -> Self {
        Self {
            rise,
            set,
            max_elevation,
            rise_azimuth: 135.0,
            descent_rate: 0.0,
        }
    }

    pub fn with_descent(mut self, degrees_per_minute: f64) -> Self {
        self.descent_rate = degrees_per_minute;
        self
    }

    fn contains(&self, t: f64) -> bool {
        t >= self.rise && t <= self.set
    }

    fn descending(&self, t: f64) -> bool {
        self.descent_rate > 0.0 && t > self.set && (t - self.set) * self.descent_rate < 30.0
    }

    fn elevation(&self, t: f64) -> f64 {
        if self.contains(t) {
            self.max_elevation * (std::f64::consts::PI * self.phase(t)).sin()
        } else {
            -self.descent_rate * (t - self.set)
        }
    }

    fn phase(&self, t: f64) -> f64 {
        (t - self.rise) / (self.set - self.rise)
    }
}

/// Satellite whose elevation is a half sine inside each window and sits at
/// -30 degrees everywhere else, optionally sinking linearly after set.
pub struct SyntheticSatellite {
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub windows: Vec<Window>,
    pub altitude_km: f64,
    pub range_rate_km_s: f64,
}

impl SyntheticSatellite {
    pub fn new(name: &str, epoch: DateTime<Utc>, windows: Vec<Window>) -> Self {
        Self {
            name: name.to_string(),
            epoch,
            windows,
            altitude_km: 550.0,
            range_rate_km_s: 6.0,
        }
    }

    pub fn minutes(&self, at: DateTime<Utc>) -> f64 {
        (at - self.epoch).num_microseconds().unwrap_or(i64::MAX) as f64 / 60e6
    }

    fn active(&self, t: f64) -> Option<&Window> {
        self.windows
            .iter()
            .find(|w| w.contains(t))
            .or_else(|| self.windows.iter().find(|w| w.descending(t)))
    }

    pub fn elevation(&self, t: f64) -> f64 {
        self.active(t).map(|w| w.elevation(t)).unwrap_or(-30.0)
    }

    fn azimuth(&self, t: f64) -> f64 {
        match self.active(t) {
            Some(w) => (w.rise_azimuth + 180.0 * w.phase(t)).rem_euclid(360.0),
            None => self
                .windows
                .iter()
                .find(|w| w.rise > t)
                .map(|w| w.rise_azimuth)
                .unwrap_or(0.0),
        }
    }

    /// Approaching in the first half of a window, receding in the second.
    fn range_rate(&self, t: f64) -> f64 {
        match self.windows.iter().find(|w| w.contains(t)) {
            Some(w) => self.range_rate_km_s * (2.0 * w.phase(t) - 1.0),
            None => self.range_rate_km_s,
        }
    }
}

pub fn at_minutes(epoch: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    epoch + Duration::microseconds((minutes * 60e6).round() as i64)
}

impl Ephemeris for SyntheticSatellite {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(
        &self,
        _station: &GroundStation,
        at: DateTime<Utc>,
    ) -> Result<Observation, PredictError> {
        let t = self.minutes(at);
        Ok(Observation {
            timestamp: at,
            position_km: [0.0; 3],
            velocity_km_s: [0.0; 3],
            speed_km_s: 7.6,
            latitude_deg: 0.0,
            longitude_deg: 0.0,
            altitude_km: self.altitude_km,
            azimuth_deg: self.azimuth(t),
            elevation_deg: self.elevation(t),
            range_km: 1000.0,
            range_rate_km_s: self.range_rate(t),
        })
    }
}
