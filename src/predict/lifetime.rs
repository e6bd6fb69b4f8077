use std::io::Write;

use chrono::{DateTime, Utc};

use crate::predict::error::PredictError;
use crate::predict::visibility::offset_time;
use crate::predict::{Ephemeris, GroundStation};

pub const DEFAULT_MIN_ALTITUDE_KM: f64 = 100.0;

const MINUTES_PER_YEAR: f64 = 1440.0 * 365.25;

/// Years the satellite stays above `min_altitude_km`, stepping the
/// propagator by `step_minutes` for at most `max_years`.
///
/// A propagation failure part way through is taken as the orbit having
/// decayed. Each sample is written to `samples` as `years altitude_km`.
pub fn orbital_lifetime<E: Ephemeris + ?Sized>(
    satellite: &E,
    station: &GroundStation,
    start: DateTime<Utc>,
    step_minutes: f64,
    max_years: f64,
    min_altitude_km: f64,
    mut samples: Option<&mut dyn Write>,
) -> Result<f64, PredictError> {
    if step_minutes <= 0.0 || !step_minutes.is_finite() {
        return Err(PredictError::InvalidStep(step_minutes));
    }

    let mut altitude_km = satellite.observe(station, start)?.altitude_km;
    let mut steps: u64 = 0;
    let mut years = 0.0;

    while years < max_years && altitude_km > min_altitude_km {
        if let Some(out) = samples.as_deref_mut() {
            writeln!(out, "{:.6} {:6.2}", years, altitude_km)?;
        }

        steps += 1;
        let minutes = steps as f64 * step_minutes;
        years = minutes / MINUTES_PER_YEAR;

        altitude_km = match satellite.observe(station, offset_time(start, minutes)) {
            Ok(observation) => observation.altitude_km,
            Err(PredictError::Propagation(message)) => {
                log::info!("{} decayed after {:.3} years: {}", satellite.name(), years, message);
                break;
            }
            Err(e) => return Err(e),
        };
    }

    Ok(years)
}
