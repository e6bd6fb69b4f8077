use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::predict::{GroundStation, PassCriteria};
use crate::radio::OperatingMode;
use crate::rotator::Position;
use crate::tracker::{parse_frequency_hz, AuxiliaryTarget, TrackerSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub station: StationConfig,
    pub catalog: CatalogConfig,
    pub tracking: TrackingConfig,
    pub rotator: RotatorConfig,
    pub radio: RadioConfig,
    pub frequencies: FrequencyConfig,
    pub capture: CaptureConfig,
    pub search: PassCriteria,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub name: Option<String>,
    /// `"lat, lon"`; takes precedence over the separate fields.
    pub coordinates: Option<String>,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        let station = GroundStation::default();
        Self {
            name: None,
            coordinates: None,
            latitude_deg: station.latitude_deg,
            longitude_deg: station.longitude_deg,
            altitude_m: station.altitude_m,
        }
    }
}

impl StationConfig {
    /// Overrides latitude and/or longitude. A configured `coordinates`
    /// string is resolved first so the component not overridden keeps its
    /// configured value.
    pub fn override_position(
        &mut self,
        latitude_deg: Option<f64>,
        longitude_deg: Option<f64>,
    ) -> Result<(), ConfigError> {
        if latitude_deg.is_none() && longitude_deg.is_none() {
            return Ok(());
        }
        if self.coordinates.is_some() {
            let station = self.ground_station()?;
            self.latitude_deg = station.latitude_deg;
            self.longitude_deg = station.longitude_deg;
            self.coordinates = None;
        }
        if let Some(lat) = latitude_deg {
            self.latitude_deg = lat;
        }
        if let Some(lon) = longitude_deg {
            self.longitude_deg = lon;
        }
        Ok(())
    }

    pub fn ground_station(&self) -> Result<GroundStation, ConfigError> {
        match &self.coordinates {
            Some(coordinates) => GroundStation::from_coordinates(coordinates, Some(self.altitude_m))
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("station coordinates {:?}", coordinates))
                }),
            None => Ok(GroundStation::new(
                self.latitude_deg,
                self.longitude_deg,
                self.altitude_m,
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub tle_path: PathBuf,
    pub status_path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            tle_path: PathBuf::from("tle/amateur.txt"),
            status_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    #[serde(deserialize_with = "human_duration")]
    pub tick: Duration,
    pub prep_minutes: f64,
    #[serde(deserialize_with = "human_duration")]
    pub idle_timeout: Duration,
    pub lockout_ticks: u32,
    pub azimuth_threshold_deg: f64,
    pub elevation_threshold_deg: f64,
    pub doppler_resolution_hz: f64,
    pub horizon_minutes: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let defaults = TrackerSettings::default();
        Self {
            tick: defaults.tick,
            prep_minutes: defaults.prep_minutes,
            idle_timeout: defaults.idle_timeout,
            lockout_ticks: defaults.lockout_ticks,
            azimuth_threshold_deg: defaults.azimuth_threshold_deg,
            elevation_threshold_deg: defaults.elevation_threshold_deg,
            doppler_resolution_hz: defaults.doppler_resolution_hz,
            horizon_minutes: defaults.horizon_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    pub enabled: bool,
    pub device: String,
    pub baud_rate: u32,
    #[serde(deserialize_with = "human_duration")]
    pub timeout: Duration,
    /// Abort start-up when the port cannot be opened.
    pub required: bool,
    /// Whether the firmware answers SET with a position report.
    pub set_responds: bool,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 600,
            timeout: Duration::from_millis(200),
            required: false,
            set_responds: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub enabled: bool,
    pub device: String,
    pub baud_rate: u32,
    #[serde(deserialize_with = "human_duration")]
    pub timeout: Duration,
    pub required: bool,
    /// Operating mode set on the selected band when the radio is opened.
    pub mode: Option<OperatingMode>,
    /// Filter slot for `mode`, 1 to 3.
    pub filter: u8,
    pub waterfall: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: "/dev/ttyUSB1".to_string(),
            baud_rate: 19200,
            timeout: Duration::from_millis(100),
            required: false,
            mode: None,
            filter: 1,
            waterfall: false,
        }
    }
}

/// Frequencies are written with units, e.g. `"145.990 MHz"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub uplink: Option<String>,
    pub downlink: Option<String>,
    pub auxiliary: Option<AuxiliaryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuxiliaryConfig {
    pub frequency: String,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: String,
    pub rate_hz: u32,
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "hw:3,0".to_string(),
            rate_hz: 48000,
            channels: 2,
        }
    }
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn frequency(field: &str, text: &Option<String>) -> Result<Option<f64>, ConfigError> {
    text.as_deref()
        .map(|t| {
            parse_frequency_hz(t)
                .ok_or_else(|| ConfigError::Invalid(format!("{} frequency {:?}", field, t)))
        })
        .transpose()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// An empty document yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let station = self.station.ground_station()?;
        if !(-90.0..=90.0).contains(&station.latitude_deg) {
            return Err(ConfigError::Invalid(format!(
                "latitude {} outside +-90",
                station.latitude_deg
            )));
        }

        let tracking = &self.tracking;
        if tracking.tick.is_zero() {
            return Err(ConfigError::Invalid("tick period must be positive".into()));
        }
        if tracking.lockout_ticks == 0 {
            return Err(ConfigError::Invalid("lockout_ticks must be at least 1".into()));
        }
        if !(1..=3).contains(&self.radio.filter) {
            return Err(ConfigError::Invalid(format!(
                "radio filter {} outside 1-3",
                self.radio.filter
            )));
        }
        for (name, value) in [
            ("prep_minutes", tracking.prep_minutes),
            ("azimuth_threshold_deg", tracking.azimuth_threshold_deg),
            ("elevation_threshold_deg", tracking.elevation_threshold_deg),
            ("doppler_resolution_hz", tracking.doppler_resolution_hz),
            ("horizon_minutes", tracking.horizon_minutes),
        ] {
            if value < 0.0 || value.is_nan() {
                return Err(ConfigError::Invalid(format!("{} must not be negative", name)));
            }
        }

        let search = &self.search;
        for (name, min, max) in [
            ("altitude", search.min_altitude_km, search.max_altitude_km),
            ("minutes", search.min_minutes, search.max_minutes),
            ("elevation", search.min_elevation_deg, search.max_elevation_deg),
        ] {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "search {} band: {} > {}",
                    name, min, max
                )));
            }
        }

        frequency("uplink", &self.frequencies.uplink)?;
        frequency("downlink", &self.frequencies.downlink)?;
        self.auxiliary()?;
        Ok(())
    }

    pub fn auxiliary(&self) -> Result<Option<AuxiliaryTarget>, ConfigError> {
        let Some(aux) = &self.frequencies.auxiliary else {
            return Ok(None);
        };
        let frequency_hz = parse_frequency_hz(&aux.frequency).ok_or_else(|| {
            ConfigError::Invalid(format!("auxiliary frequency {:?}", aux.frequency))
        })?;
        let position = Position::new(aux.azimuth_deg, aux.elevation_deg)
            .checked()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Some(AuxiliaryTarget {
            frequency_hz,
            position,
        }))
    }

    pub fn tracker_settings(&self) -> Result<TrackerSettings, ConfigError> {
        let tracking = &self.tracking;
        Ok(TrackerSettings {
            tick: tracking.tick,
            prep_minutes: tracking.prep_minutes,
            idle_timeout: tracking.idle_timeout,
            lockout_ticks: tracking.lockout_ticks,
            azimuth_threshold_deg: tracking.azimuth_threshold_deg,
            elevation_threshold_deg: tracking.elevation_threshold_deg,
            doppler_resolution_hz: tracking.doppler_resolution_hz,
            horizon_minutes: tracking.horizon_minutes,
            uplink_hz: frequency("uplink", &self.frequencies.uplink)?,
            downlink_hz: frequency("downlink", &self.frequencies.downlink)?,
            auxiliary: self.auxiliary()?,
            ..TrackerSettings::default()
        })
    }
}
