use serde::Serialize;

use crate::radio::Vfo;

pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Frequency heard on the ground for a transmission at `freq_hz`.
/// Positive range rate means the satellite is receding.
pub fn apply_downlink_doppler(freq_hz: f64, range_rate_km_s: f64) -> f64 {
    freq_hz * (1.0 - range_rate_km_s / SPEED_OF_LIGHT_KM_S)
}

/// Frequency to transmit so the satellite hears `freq_hz`.
pub fn apply_uplink_doppler(freq_hz: f64, range_rate_km_s: f64) -> f64 {
    freq_hz * (1.0 + range_rate_km_s / SPEED_OF_LIGHT_KM_S)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Uplink,
    Downlink,
}

/// One radio VFO following a Doppler-shifted frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DopplerChannel {
    pub direction: Direction,
    pub vfo: Vfo,
    pub nominal_hz: f64,
    pub last_commanded_hz: Option<f64>,
    pub last_confirmed_hz: Option<f64>,
}

impl DopplerChannel {
    pub fn new(direction: Direction, vfo: Vfo, nominal_hz: f64) -> Self {
        Self {
            direction,
            vfo,
            nominal_hz,
            last_commanded_hz: None,
            last_confirmed_hz: None,
        }
    }

    pub fn shifted_hz(&self, range_rate_km_s: f64) -> f64 {
        match self.direction {
            Direction::Uplink => apply_uplink_doppler(self.nominal_hz, range_rate_km_s),
            Direction::Downlink => apply_downlink_doppler(self.nominal_hz, range_rate_km_s),
        }
    }

    /// True when `hz` has moved more than `resolution_hz` from the last
    /// commanded value, or nothing has been commanded yet.
    pub fn needs_retune(&self, hz: f64, resolution_hz: f64) -> bool {
        self.last_commanded_hz
            .map_or(true, |last| (hz - last).abs() > resolution_hz)
    }

    pub fn record(&mut self, commanded_hz: f64, confirmed_hz: f64) {
        self.last_commanded_hz = Some(commanded_hz);
        self.last_confirmed_hz = Some(confirmed_hz);
    }

    pub fn reset(&mut self) {
        self.last_commanded_hz = None;
        self.last_confirmed_hz = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn approaching_satellite_is_heard_high() {
        let heard = apply_downlink_doppler(437_800_000.0, -7.0);
        assert_relative_eq!(heard, 437_800_000.0 * (1.0 + 7.0 / SPEED_OF_LIGHT_KM_S));
        assert!(heard > 437_800_000.0);
    }

    #[test]
    fn uplink_precompensates() {
        let sent = apply_uplink_doppler(145_990_000.0, -7.0);
        assert!(sent < 145_990_000.0);
        assert_relative_eq!(
            sent,
            145_990_000.0 * (1.0 - 7.0 / SPEED_OF_LIGHT_KM_S),
            max_relative = 1e-12
        );
    }

    #[test]
    fn zero_range_rate_is_nominal() {
        assert_eq!(apply_downlink_doppler(1e8, 0.0), 1e8);
        assert_eq!(apply_uplink_doppler(1e8, 0.0), 1e8);
    }

    #[test]
    fn retune_respects_resolution() {
        let mut channel = DopplerChannel::new(Direction::Downlink, Vfo::Main, 437_800_000.0);
        assert!(channel.needs_retune(437_800_000.0, 1000.0));

        channel.record(437_800_000.0, 437_800_000.0);
        assert!(!channel.needs_retune(437_801_000.0, 1000.0));
        assert!(channel.needs_retune(437_801_001.0, 1000.0));
        assert!(channel.needs_retune(437_798_500.0, 1000.0));

        channel.reset();
        assert!(channel.needs_retune(437_800_000.0, 1000.0));
    }
}
