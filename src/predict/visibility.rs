use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::types::PassSummary;
use crate::predict::{Ephemeris, GroundStation};

pub const COARSE_STEP_MINUTES: f64 = 1.0;
pub const MEDIUM_STEP_MINUTES: f64 = 0.1;
pub const FINE_STEP_MINUTES: f64 = 0.5 / 60.0;
pub const PASS_STEP_MINUTES: f64 = 0.25;

/// Below this elevation a pass sweep is considered over.
pub const LOS_ELEVATION_DEG: f64 = -5.0;
/// Longest pass sweep walked before giving up on a loss of signal.
pub const MAX_SWEEP_MINUTES: f64 = 1440.0;

const HORIZON_ELEVATION_DEG: f64 = 0.0;

/// Outcome of looking for the next pass from a given instant.
#[derive(Debug, Clone, PartialEq)]
pub enum NextPass {
    Upcoming { minutes: f64, summary: PassSummary },
    InProgress { minutes_since_rise: f64 },
    NotFound,
}

pub fn offset_time(from: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    from + Duration::microseconds((minutes * 60e6).round() as i64)
}

/// Signed minutes to the nearest horizon crossing, walking forward when the
/// satellite is below the horizon and backward when it is above.
///
/// Positive values are minutes until rise, negative values are minutes since
/// the satellite rose. `None` when no crossing lies within `horizon_minutes`.
pub fn time_to_visibility<E: Ephemeris + ?Sized>(
    satellite: &E,
    station: &GroundStation,
    from: DateTime<Utc>,
    horizon_minutes: f64,
    step_minutes: f64,
) -> Result<Option<f64>, PredictError> {
    if step_minutes <= 0.0 || !step_minutes.is_finite() {
        return Err(PredictError::InvalidStep(step_minutes));
    }

    let elevation = satellite.observe(station, from)?.elevation_deg;
    let (direction, still_on_side): (f64, fn(f64) -> bool) = if elevation < HORIZON_ELEVATION_DEG {
        (1.0, |el| el < HORIZON_ELEVATION_DEG)
    } else {
        (-1.0, |el| el > HORIZON_ELEVATION_DEG)
    };

    let mut steps: u64 = 0;
    let mut elevation = elevation;
    while still_on_side(elevation) {
        steps += 1;
        let elapsed = steps as f64 * step_minutes;
        if elapsed >= horizon_minutes {
            return Ok(None);
        }
        elevation = satellite
            .observe(station, offset_time(from, direction * elapsed))?
            .elevation_deg;
    }

    Ok(Some(direction * steps as f64 * step_minutes))
}

/// Coarse search refined with 6 s steps once within 10 minutes of the
/// crossing, then 0.5 s steps once within a minute.
pub fn refined_time_to_visibility<E: Ephemeris + ?Sized>(
    satellite: &E,
    station: &GroundStation,
    from: DateTime<Utc>,
    horizon_minutes: f64,
    step_minutes: f64,
) -> Result<Option<f64>, PredictError> {
    let mut estimate = time_to_visibility(satellite, station, from, horizon_minutes, step_minutes)?;
    let mut step = step_minutes;

    for (within, finer) in [(10.0, MEDIUM_STEP_MINUTES), (1.0, FINE_STEP_MINUTES)] {
        match estimate {
            Some(minutes) if minutes.abs() < within && finer < step => {
                estimate = time_to_visibility(satellite, station, from, horizon_minutes, finer)?;
                step = finer;
            }
            _ => {}
        }
    }

    Ok(estimate)
}

/// Walks a pass from `rise` until the elevation falls to the loss-of-signal
/// margin, accumulating duration and time above 0 and 30 degrees.
pub fn characterize_pass<E: Ephemeris + ?Sized>(
    satellite: &E,
    station: &GroundStation,
    rise: DateTime<Utc>,
    step_minutes: f64,
) -> Result<PassSummary, PredictError> {
    if step_minutes <= 0.0 || !step_minutes.is_finite() {
        return Err(PredictError::InvalidStep(step_minutes));
    }

    let first = satellite.observe(station, rise)?;
    let mut summary = PassSummary {
        duration_minutes: 0.0,
        minutes_above_0: 0.0,
        minutes_above_30: 0.0,
        max_elevation_deg: first.elevation_deg,
        max_altitude_km: first.altitude_km,
        rise_azimuth_deg: first.azimuth_deg,
        rise_time: rise,
    };
    let mut ascended = false;
    let mut steps: u64 = 0;
    let mut observation = first;

    while observation.elevation_deg > LOS_ELEVATION_DEG {
        let elevation = observation.elevation_deg;
        summary.duration_minutes += step_minutes;
        summary.max_elevation_deg = summary.max_elevation_deg.max(elevation);

        if elevation > HORIZON_ELEVATION_DEG {
            summary.minutes_above_0 += step_minutes;
            summary.max_altitude_km = summary.max_altitude_km.max(observation.altitude_km);
            if !ascended {
                ascended = true;
                summary.rise_azimuth_deg = observation.azimuth_deg;
                summary.rise_time = observation.timestamp;
            }
            if elevation > 30.0 {
                summary.minutes_above_30 += step_minutes;
            }
        }

        steps += 1;
        let elapsed = steps as f64 * step_minutes;
        if elapsed > MAX_SWEEP_MINUTES {
            return Err(PredictError::SweepIncomplete(MAX_SWEEP_MINUTES));
        }
        observation = satellite.observe(station, offset_time(rise, elapsed))?;
    }

    Ok(summary)
}

/// Finds the next rise after `from` and characterizes the whole pass.
pub fn next_pass<E: Ephemeris + ?Sized>(
    satellite: &E,
    station: &GroundStation,
    from: DateTime<Utc>,
    horizon_minutes: f64,
    step_minutes: f64,
) -> Result<NextPass, PredictError> {
    let minutes =
        match refined_time_to_visibility(satellite, station, from, horizon_minutes, step_minutes)? {
            Some(minutes) => minutes,
            None => return Ok(NextPass::NotFound),
        };

    if minutes < 0.0 {
        return Ok(NextPass::InProgress {
            minutes_since_rise: -minutes,
        });
    }

    let summary = characterize_pass(
        satellite,
        station,
        offset_time(from, minutes),
        PASS_STEP_MINUTES,
    )?;
    Ok(NextPass::Upcoming { minutes, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::synthetic::{at_minutes, SyntheticSatellite, Window};
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 3, 0, 0).unwrap()
    }

    fn station() -> GroundStation {
        GroundStation::new(50.88, -114.29, 1250.0)
    }

    fn scenario() -> SyntheticSatellite {
        SyntheticSatellite::new("SYNTH-1", epoch(), vec![Window::new(12.0, 20.0, 42.0)])
    }

    #[test]
    fn coarse_search_finds_rise() {
        let minutes = time_to_visibility(&scenario(), &station(), epoch(), 1440.0, 1.0)
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(minutes, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn finer_steps_converge_on_crossing() {
        let sat = SyntheticSatellite::new("SYNTH-2", epoch(), vec![Window::new(7.43, 15.0, 30.0)]);
        let coarse = time_to_visibility(&sat, &station(), epoch(), 1440.0, 1.0)
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(coarse, 8.0, epsilon = 1e-9);

        let medium = time_to_visibility(&sat, &station(), epoch(), 1440.0, MEDIUM_STEP_MINUTES)
            .unwrap()
            .unwrap();
        assert!((medium - 7.43).abs() <= MEDIUM_STEP_MINUTES);

        let fine = time_to_visibility(&sat, &station(), epoch(), 1440.0, FINE_STEP_MINUTES)
            .unwrap()
            .unwrap();
        assert!((fine - 7.43).abs() <= FINE_STEP_MINUTES);
    }

    #[test]
    fn refinement_runs_both_precision_passes_near_rise() {
        let sat = SyntheticSatellite::new("SYNTH-3", epoch(), vec![Window::new(0.73, 9.0, 25.0)]);
        let minutes = refined_time_to_visibility(&sat, &station(), epoch(), 1440.0, 1.0)
            .unwrap()
            .unwrap();
        assert!((minutes - 0.73).abs() <= FINE_STEP_MINUTES);
    }

    #[test]
    fn refinement_skipped_for_distant_rise() {
        let minutes = refined_time_to_visibility(&scenario(), &station(), epoch(), 1440.0, 1.0)
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(minutes, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn visible_satellite_reports_minutes_since_rise() {
        let sat = SyntheticSatellite::new("UP", epoch(), vec![Window::new(-4.0, 5.0, 60.0)]);
        let minutes = time_to_visibility(&sat, &station(), epoch(), 1440.0, 1.0)
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(minutes, -4.0, epsilon = 1e-9);
    }

    #[test]
    fn no_crossing_inside_horizon_is_unknown() {
        let result = time_to_visibility(&scenario(), &station(), epoch(), 10.0, 1.0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn rejects_non_positive_step() {
        let result = time_to_visibility(&scenario(), &station(), epoch(), 10.0, 0.0);
        assert!(matches!(result, Err(PredictError::InvalidStep(_))));
    }

    #[test]
    fn characterizes_scenario_pass() {
        let rise = at_minutes(epoch(), 12.0);
        let summary = characterize_pass(&scenario(), &station(), rise, PASS_STEP_MINUTES).unwrap();

        assert!((summary.duration_minutes - 8.0).abs() <= PASS_STEP_MINUTES);
        assert!((summary.minutes_above_0 - 8.0).abs() <= PASS_STEP_MINUTES);
        assert_abs_diff_eq!(summary.max_elevation_deg, 42.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.max_altitude_km, 550.0, epsilon = 1e-9);
        assert!(summary.minutes_above_30 > 0.0 && summary.minutes_above_30 < 8.0);
        assert!((summary.rise_time - rise).num_seconds() <= 15);
        assert!(summary.rise_azimuth_deg >= 135.0 && summary.rise_azimuth_deg < 145.0);
    }

    #[test]
    fn pass_duration_runs_to_loss_of_signal_margin() {
        // Sinks one degree per minute after setting, so LOS is five minutes after set.
        let sat = SyntheticSatellite::new(
            "SLOW-SET",
            epoch(),
            vec![Window::new(12.0, 20.0, 42.0).with_descent(1.0)],
        );
        let rise = at_minutes(epoch(), 12.0);
        let summary = characterize_pass(&sat, &station(), rise, PASS_STEP_MINUTES).unwrap();

        assert!((summary.minutes_above_0 - 8.0).abs() <= PASS_STEP_MINUTES);
        assert!((summary.duration_minutes - 13.0).abs() <= PASS_STEP_MINUTES);
        assert!(
            (summary.duration_minutes - summary.minutes_above_0 - 5.0).abs()
                <= 2.0 * PASS_STEP_MINUTES
        );
        assert_abs_diff_eq!(summary.max_elevation_deg, 42.0, epsilon = 1e-9);
        assert!(summary.rise_azimuth_deg >= 135.0 && summary.rise_azimuth_deg < 145.0);
        assert!((summary.rise_time - rise).num_seconds() <= 15);
    }

    #[test]
    fn rise_azimuth_ignores_below_horizon_start() {
        // Sweep starts while the previous window is still sinking below the horizon.
        let sat = SyntheticSatellite::new(
            "BACK-TO-BACK",
            epoch(),
            vec![
                Window::new(0.0, 4.0, 20.0).with_descent(1.0),
                Window::new(6.0, 14.0, 35.0),
            ],
        );
        let start = at_minutes(epoch(), 5.0);
        let summary = characterize_pass(&sat, &station(), start, PASS_STEP_MINUTES).unwrap();

        assert_abs_diff_eq!(summary.max_elevation_deg, 35.0, epsilon = 1e-9);
        assert!(summary.rise_azimuth_deg >= 135.0 && summary.rise_azimuth_deg < 145.0);
        assert!((summary.rise_time - at_minutes(epoch(), 6.0)).num_seconds().abs() <= 15);
        assert!((summary.minutes_above_0 - 8.0).abs() <= PASS_STEP_MINUTES);
    }

    #[test]
    fn never_setting_sweep_is_incomplete() {
        let sat = SyntheticSatellite::new("GEO", epoch(), vec![Window::new(0.0, 5000.0, 30.0)]);
        let result = characterize_pass(&sat, &station(), at_minutes(epoch(), 1.0), 1.0);
        assert!(matches!(result, Err(PredictError::SweepIncomplete(_))));
    }

    #[test]
    fn next_pass_distinguishes_upcoming_and_in_progress() {
        match next_pass(&scenario(), &station(), epoch(), 1440.0, 1.0).unwrap() {
            NextPass::Upcoming { minutes, summary } => {
                assert_abs_diff_eq!(minutes, 12.0, epsilon = 1e-9);
                assert_abs_diff_eq!(summary.max_elevation_deg, 42.0, epsilon = 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }

        let up = SyntheticSatellite::new("UP", epoch(), vec![Window::new(-3.0, 5.0, 60.0)]);
        assert!(matches!(
            next_pass(&up, &station(), epoch(), 1440.0, 1.0).unwrap(),
            NextPass::InProgress { .. }
        ));

        let empty = SyntheticSatellite::new("NONE", epoch(), vec![]);
        assert_eq!(
            next_pass(&empty, &station(), epoch(), 60.0, 1.0).unwrap(),
            NextPass::NotFound
        );
    }
}
