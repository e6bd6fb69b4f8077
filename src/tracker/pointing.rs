use crate::rotator::{Position, AZIMUTH_MAX_DEG, AZIMUTH_MIN_DEG, ELEVATION_MAX_DEG, ELEVATION_MIN_DEG};

/// Reported positions closer than this are considered unchanged.
const SETTLED_DEG: f64 = 0.05;

/// Chooses among `azimuth`, `azimuth - 360` and `azimuth + 360` the one
/// inside the rotator range closest to `last`, so the antenna never slews a
/// full turn to reach an equivalent bearing.
pub fn unwrap_azimuth(azimuth_deg: f64, last: Option<f64>) -> f64 {
    let base = azimuth_deg.rem_euclid(360.0);
    let reference = last.unwrap_or(base);
    [base - 360.0, base, base + 360.0]
        .into_iter()
        .filter(|a| (AZIMUTH_MIN_DEG..=AZIMUTH_MAX_DEG).contains(a))
        .min_by(|a, b| (a - reference).abs().total_cmp(&(b - reference).abs()))
        .unwrap_or(base)
}

/// Antenna position that follows a satellite at `azimuth_deg`/`elevation_deg`.
/// Below the horizon the antenna waits at zero elevation.
pub fn follow(azimuth_deg: f64, elevation_deg: f64, last: Option<Position>) -> Position {
    Position::new(
        unwrap_azimuth(azimuth_deg, last.map(|p| p.azimuth_deg)),
        elevation_deg.clamp(ELEVATION_MIN_DEG, ELEVATION_MAX_DEG),
    )
}

/// True when either axis of `target` differs from the last commanded
/// position by more than its threshold.
pub fn needs_repoint(
    target: Position,
    last_commanded: Option<Position>,
    azimuth_threshold_deg: f64,
    elevation_threshold_deg: f64,
) -> bool {
    match last_commanded {
        None => true,
        Some(last) => {
            (target.azimuth_deg - last.azimuth_deg).abs() > azimuth_threshold_deg
                || (target.elevation_deg - last.elevation_deg).abs() > elevation_threshold_deg
        }
    }
}

pub fn settled(previous: Option<Position>, current: Position) -> bool {
    previous.map_or(false, |p| {
        (p.azimuth_deg - current.azimuth_deg).abs() < SETTLED_DEG
            && (p.elevation_deg - current.elevation_deg).abs() < SETTLED_DEG
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_without_history_uses_base_turn() {
        assert_eq!(unwrap_azimuth(350.0, None), 350.0);
        assert_eq!(unwrap_azimuth(-10.0, None), 350.0);
        assert_eq!(unwrap_azimuth(10.0, None), 10.0);
    }

    #[test]
    fn unwrap_stays_near_last_command() {
        // Crossing north while sitting just past 360.
        assert_eq!(unwrap_azimuth(5.0, Some(358.0)), 365.0);
        // Crossing north from the other side.
        assert_eq!(unwrap_azimuth(355.0, Some(2.0)), -5.0);
        // Far into the second turn.
        assert_eq!(unwrap_azimuth(170.0, Some(500.0)), 530.0);
        // 540 is out of range.
        assert_eq!(unwrap_azimuth(180.0, Some(530.0)), 180.0);
    }

    #[test]
    fn follow_clamps_elevation() {
        let p = follow(90.0, -3.0, None);
        assert_eq!(p, Position::new(90.0, 0.0));
        assert!(p.within_limits());
    }

    #[test]
    fn repoint_threshold() {
        let last = Some(Position::new(100.0, 20.0));
        assert!(!needs_repoint(Position::new(101.5, 21.5), last, 2.0, 2.0));
        assert!(needs_repoint(Position::new(102.5, 20.0), last, 2.0, 2.0));
        assert!(needs_repoint(Position::new(100.0, 17.0), last, 2.0, 2.0));
        assert!(needs_repoint(Position::new(100.0, 20.0), None, 2.0, 2.0));
    }

    #[test]
    fn settled_needs_two_matching_reports() {
        let p = Position::new(120.0, 30.0);
        assert!(!settled(None, p));
        assert!(settled(Some(p), Position::new(120.01, 30.0)));
        assert!(!settled(Some(p), Position::new(121.0, 30.0)));
    }
}
