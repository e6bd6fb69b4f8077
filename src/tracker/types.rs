use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;

use crate::predict::Observation;
use crate::radio::Vfo;
use crate::rotator::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum TrackingMode {
    /// No pass imminent.
    Idle,
    /// Pass due within the preparation time; antenna waits at the rise azimuth.
    Armed,
    /// Satellite above the horizon and being followed.
    Tracking,
    /// Pass over, waiting out the idle timeout.
    CoolingDown,
}

/// Discrete operator inputs, independent of how the surface reads them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorCommand {
    Unlock,
    StartTracking,
    StopTracking,
    ResetHome,
    ToggleAuxiliary,
    Pin(Position),
    Unpin,
}

impl OperatorCommand {
    pub fn is_state_changing(&self) -> bool {
        !matches!(self, OperatorCommand::Unlock)
    }
}

/// Fixed beacon used to calibrate against, with Doppler correction off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxiliaryTarget {
    pub frequency_hz: f64,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub tick: Duration,
    pub prep_minutes: f64,
    pub idle_timeout: Duration,
    pub lockout_ticks: u32,
    pub azimuth_threshold_deg: f64,
    pub elevation_threshold_deg: f64,
    pub doppler_resolution_hz: f64,
    pub horizon_minutes: f64,
    pub uplink_hz: Option<f64>,
    pub downlink_hz: Option<f64>,
    pub uplink_vfo: Vfo,
    pub downlink_vfo: Vfo,
    pub auxiliary: Option<AuxiliaryTarget>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            prep_minutes: 5.0,
            idle_timeout: Duration::from_secs(600),
            lockout_ticks: 3,
            azimuth_threshold_deg: 2.0,
            elevation_threshold_deg: 2.0,
            doppler_resolution_hz: 1000.0,
            horizon_minutes: 1440.0,
            uplink_hz: None,
            downlink_hz: None,
            uplink_vfo: Vfo::Sub,
            downlink_vfo: Vfo::Main,
            auxiliary: None,
        }
    }
}

/// Controller state, mutated only by the controller itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSession {
    pub mode: TrackingMode,
    /// Cleared by stop and home, set by start.
    pub engaged: bool,
    pub target: Option<Position>,
    pub last_commanded: Option<Position>,
    pub last_reported: Option<Position>,
    pub repoint_in_flight: bool,
    pub idle_since: Option<DateTime<Utc>>,
    pub pinned: Option<Position>,
    pub auxiliary: bool,
    pub satellite_mode: bool,
    pub unlocked_ticks: u32,
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Idle,
            engaged: true,
            target: None,
            last_commanded: None,
            last_reported: None,
            repoint_in_flight: false,
            idle_since: None,
            pinned: None,
            auxiliary: false,
            satellite_mode: false,
            unlocked_ticks: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub satellite: String,
    pub mode: TrackingMode,
    pub observation: Option<Observation>,
    pub minutes_to_visibility: Option<f64>,
    pub target: Option<Position>,
    pub last_commanded: Option<Position>,
    pub last_reported: Option<Position>,
    pub uplink_hz: Option<f64>,
    pub downlink_hz: Option<f64>,
    pub pinned: bool,
    pub auxiliary: bool,
    pub rotator_available: bool,
    pub radio_available: bool,
}
