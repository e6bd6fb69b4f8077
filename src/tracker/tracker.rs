use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::device::Device;
use super::doppler::{Direction, DopplerChannel};
use super::error::TrackerError;
use super::pointing::{follow, needs_repoint, settled};
use super::types::{OperatorCommand, TrackerSettings, TrackerStatus, TrackingMode, TrackingSession};
use crate::capture::CaptureWorker;
use crate::predict::{
    offset_time, refined_time_to_visibility, Ephemeris, GroundStation, Observation,
    COARSE_STEP_MINUTES,
};
use crate::radio::Transceiver;
use crate::rotator::{Position, Rotator};

/// Polling controller that keeps the antenna and radio on one satellite.
///
/// Each tick runs propagation, visibility, the mode transition and then
/// any hardware commands, strictly in that order.
pub struct Controller<E> {
    satellite: E,
    station: GroundStation,
    settings: TrackerSettings,
    session: TrackingSession,
    rotator: Device<dyn Rotator>,
    radio: Device<dyn Transceiver>,
    uplink: Option<DopplerChannel>,
    downlink: Option<DopplerChannel>,
    reference: Option<DopplerChannel>,
    commands: Option<Receiver<OperatorCommand>>,
    capture: Option<CaptureWorker>,
    observation: Option<Observation>,
    minutes_to_visibility: Option<f64>,
}

impl<E: Ephemeris> Controller<E> {
    pub fn new(
        satellite: E,
        station: GroundStation,
        settings: TrackerSettings,
        rotator: Option<Box<dyn Rotator>>,
        radio: Option<Box<dyn Transceiver>>,
    ) -> Self {
        let uplink = settings
            .uplink_hz
            .map(|hz| DopplerChannel::new(Direction::Uplink, settings.uplink_vfo, hz));
        let downlink = settings
            .downlink_hz
            .map(|hz| DopplerChannel::new(Direction::Downlink, settings.downlink_vfo, hz));
        let reference = settings.auxiliary.map(|aux| {
            DopplerChannel::new(Direction::Downlink, settings.downlink_vfo, aux.frequency_hz)
        });

        Self {
            satellite,
            station,
            settings,
            session: TrackingSession::default(),
            rotator: Device::new("rotator", rotator),
            radio: Device::new("radio", radio),
            uplink,
            downlink,
            reference,
            commands: None,
            capture: None,
            observation: None,
            minutes_to_visibility: None,
        }
    }

    /// Operator commands queued here are applied at the start of each tick.
    pub fn with_commands(mut self, commands: Receiver<OperatorCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Capture worker joined on shutdown.
    pub fn with_capture(mut self, capture: CaptureWorker) -> Self {
        self.capture = Some(capture);
        self
    }

    #[cfg(test)]
    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn status(&self) -> TrackerStatus {
        TrackerStatus {
            satellite: self.satellite.name().to_string(),
            mode: self.session.mode,
            observation: self.observation.clone(),
            minutes_to_visibility: self.minutes_to_visibility,
            target: self.session.target,
            last_commanded: self.session.last_commanded,
            last_reported: self.session.last_reported,
            uplink_hz: self.uplink.as_ref().and_then(|c| c.last_commanded_hz),
            downlink_hz: self.downlink.as_ref().and_then(|c| c.last_commanded_hz),
            pinned: self.session.pinned.is_some(),
            auxiliary: self.session.auxiliary,
            rotator_available: self.rotator.is_available(),
            radio_available: self.radio.is_available(),
        }
    }

    /// Ticks until `running` is cleared, then shuts the hardware down.
    pub fn run(&mut self, running: &AtomicBool) {
        log::info!(
            "Tracking {} every {:?}",
            self.satellite.name(),
            self.settings.tick
        );

        while running.load(Ordering::SeqCst) {
            let started = Instant::now();
            if let Err(e) = self.tick(Utc::now()) {
                log::warn!("Tick failed: {}", e);
            }
            self.report();
            self.check_capture();
            if let Some(remaining) = self.settings.tick.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        self.shutdown();
    }

    /// An unlock granted while draining this tick's commands is not
    /// counted down until the following tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<(), TrackerError> {
        let unlocked_now = self.drain_commands();
        let result = self.step(now);
        if !unlocked_now {
            self.session.unlocked_ticks = self.session.unlocked_ticks.saturating_sub(1);
        }
        result
    }

    fn report(&self) {
        let status = self.status();
        if let Some(obs) = &status.observation {
            log::debug!(
                "{} az {:.1} el {:.1} range {:.0} km rr {:.3} km/s",
                status.mode,
                obs.azimuth_deg,
                obs.elevation_deg,
                obs.range_km,
                obs.range_rate_km_s
            );
        }
        if log::log_enabled!(log::Level::Trace) {
            match serde_json::to_string(&status) {
                Ok(json) => log::trace!("Status {}", json),
                Err(e) => log::warn!("Status not serializable: {}", e),
            }
        }
    }

    fn check_capture(&mut self) {
        if self.capture.as_ref().map_or(true, |c| c.is_running()) {
            return;
        }
        if let Some(capture) = self.capture.take() {
            log::warn!("Audio capture to {} ended", capture.path().display());
            if let Err(e) = capture.stop() {
                log::error!("Audio capture: {}", e);
            }
        }
    }

    fn step(&mut self, now: DateTime<Utc>) -> Result<(), TrackerError> {
        let observation = self.satellite.observe(&self.station, now)?;
        let minutes = refined_time_to_visibility(
            &self.satellite,
            &self.station,
            now,
            self.settings.horizon_minutes,
            COARSE_STEP_MINUTES,
        )?;
        self.minutes_to_visibility = minutes;

        self.transition(now, observation.elevation_deg, minutes);
        let target = self.pointing_target(&observation, now, minutes)?;
        self.observation = Some(observation);

        self.command_rotator(target);
        self.command_radio();
        Ok(())
    }

    fn transition(&mut self, now: DateTime<Utc>, elevation_deg: f64, minutes: Option<f64>) {
        let previous = self.session.mode;
        let visible = elevation_deg > 0.0;
        let imminent = visible || minutes.map_or(false, |m| m < self.settings.prep_minutes);

        let next = if !self.session.engaged {
            TrackingMode::Idle
        } else if imminent && visible {
            TrackingMode::Tracking
        } else if imminent {
            TrackingMode::Armed
        } else {
            match previous {
                TrackingMode::Armed | TrackingMode::Tracking => TrackingMode::CoolingDown,
                TrackingMode::CoolingDown if self.idle_expired(now) => TrackingMode::Idle,
                other => other,
            }
        };

        match next {
            TrackingMode::CoolingDown if previous != TrackingMode::CoolingDown => {
                self.session.idle_since = Some(now)
            }
            TrackingMode::CoolingDown => {}
            _ => self.session.idle_since = None,
        }

        if next != previous {
            log::info!("{}: {} -> {}", self.satellite.name(), previous, next);
        }
        self.session.mode = next;
    }

    fn idle_expired(&self, now: DateTime<Utc>) -> bool {
        self.session
            .idle_since
            .and_then(|since| (now - since).to_std().ok())
            .map_or(false, |elapsed| elapsed >= self.settings.idle_timeout)
    }

    fn pointing_target(
        &self,
        observation: &Observation,
        now: DateTime<Utc>,
        minutes: Option<f64>,
    ) -> Result<Option<Position>, TrackerError> {
        if !self.session.engaged {
            return Ok(None);
        }
        if self.session.auxiliary {
            if let Some(aux) = self.settings.auxiliary {
                return Ok(Some(aux.position));
            }
        }
        if let Some(pinned) = self.session.pinned {
            return Ok(Some(pinned));
        }

        let last = self.session.last_commanded;
        let target = match self.session.mode {
            TrackingMode::Tracking => Some(follow(
                observation.azimuth_deg,
                observation.elevation_deg,
                last,
            )),
            TrackingMode::Armed => {
                let rise_azimuth = match minutes {
                    Some(m) if m > 0.0 => {
                        self.satellite
                            .observe(&self.station, offset_time(now, m))?
                            .azimuth_deg
                    }
                    _ => observation.azimuth_deg,
                };
                Some(follow(rise_azimuth, 0.0, last))
            }
            TrackingMode::Idle | TrackingMode::CoolingDown => None,
        };
        Ok(target)
    }

    fn command_rotator(&mut self, target: Option<Position>) {
        self.session.target = target;

        if self.session.repoint_in_flight {
            let previous = self.session.last_reported;
            match self.rotator.with(|r| r.status()) {
                Some(position) => {
                    self.session.last_reported = Some(position);
                    if settled(previous, position) {
                        log::debug!(
                            "Rotator settled at az {:.1} el {:.1}",
                            position.azimuth_deg,
                            position.elevation_deg
                        );
                        self.session.repoint_in_flight = false;
                    }
                }
                None => self.session.repoint_in_flight = false,
            }
            return;
        }

        let Some(target) = target else {
            return;
        };
        if !needs_repoint(
            target,
            self.session.last_commanded,
            self.settings.azimuth_threshold_deg,
            self.settings.elevation_threshold_deg,
        ) {
            return;
        }

        if let Some(reported) = self.rotator.with(|r| r.set(target)) {
            log::debug!(
                "Rotator to az {:.1} el {:.1}",
                target.azimuth_deg,
                target.elevation_deg
            );
            self.session.last_commanded = Some(target);
            self.session.last_reported = reported;
            self.session.repoint_in_flight = true;
        }
    }

    fn command_radio(&mut self) {
        if !self.radio.is_available() || !self.session.engaged {
            return;
        }

        if self.session.auxiliary {
            if let Some(reference) = self.reference.as_mut() {
                let hz = reference.nominal_hz;
                retune(&mut self.radio, reference, hz, self.settings.doppler_resolution_hz);
            }
            return;
        }

        if !matches!(
            self.session.mode,
            TrackingMode::Armed | TrackingMode::Tracking
        ) {
            return;
        }

        if !self.session.satellite_mode
            && self.radio.with(|r| r.set_satellite_mode(true)).is_some()
        {
            log::info!("Radio satellite mode on");
            self.session.satellite_mode = true;
        }

        let Some(range_rate) = self.observation.as_ref().map(|o| o.range_rate_km_s) else {
            return;
        };
        let resolution = self.settings.doppler_resolution_hz;
        for channel in [self.uplink.as_mut(), self.downlink.as_mut()].into_iter().flatten() {
            let hz = channel.shifted_hz(range_rate);
            retune(&mut self.radio, channel, hz, resolution);
        }
    }

    pub fn handle(&mut self, command: OperatorCommand) -> Result<(), TrackerError> {
        if command.is_state_changing() {
            if self.session.unlocked_ticks == 0 {
                return Err(TrackerError::Locked);
            }
            self.session.unlocked_ticks = 0;
        }
        log::info!("Operator: {:?}", command);

        match command {
            OperatorCommand::Unlock => {
                self.session.unlocked_ticks = self.settings.lockout_ticks.max(1);
            }
            OperatorCommand::StartTracking => self.session.engaged = true,
            OperatorCommand::StopTracking => {
                if let Some(position) = self.rotator.with(|r| r.stop()) {
                    self.session.last_reported = Some(position);
                }
                self.disarm();
            }
            OperatorCommand::ResetHome => {
                let home = Position::home();
                if let Some(reported) = self.rotator.with(|r| r.set(home)) {
                    self.session.last_commanded = Some(home);
                    self.session.last_reported = reported;
                }
                self.disarm();
            }
            OperatorCommand::ToggleAuxiliary => {
                if self.settings.auxiliary.is_none() {
                    log::warn!("No auxiliary reference configured");
                    return Ok(());
                }
                self.session.auxiliary = !self.session.auxiliary;
                for channel in [
                    self.uplink.as_mut(),
                    self.downlink.as_mut(),
                    self.reference.as_mut(),
                ]
                .into_iter()
                .flatten()
                {
                    channel.reset();
                }
            }
            OperatorCommand::Pin(position) => self.session.pinned = Some(position),
            OperatorCommand::Unpin => self.session.pinned = None,
        }
        Ok(())
    }

    fn disarm(&mut self) {
        self.session.engaged = false;
        self.session.mode = TrackingMode::Idle;
        self.session.idle_since = None;
        self.session.repoint_in_flight = false;
        self.session.target = None;
    }

    /// Applies queued commands. Returns whether the batch left the
    /// controller freshly unlocked.
    fn drain_commands(&mut self) -> bool {
        let pending: Vec<OperatorCommand> = match &self.commands {
            Some(commands) => commands.try_iter().collect(),
            None => return false,
        };
        let mut unlocked = false;
        for command in pending {
            match self.handle(command) {
                Ok(()) => unlocked = command == OperatorCommand::Unlock,
                Err(e) => log::warn!("Ignoring {:?}: {}", command, e),
            }
        }
        unlocked
    }

    /// Stops the rotator, releases satellite mode and joins the capture
    /// worker.
    pub fn shutdown(&mut self) {
        log::info!("Shutting down");
        if let Some(position) = self.rotator.with(|r| r.stop()) {
            self.session.last_reported = Some(position);
        }
        if self.session.satellite_mode
            && self.radio.with(|r| r.set_satellite_mode(false)).is_some()
        {
            self.session.satellite_mode = false;
        }
        if let Some(capture) = self.capture.take() {
            if let Err(e) = capture.stop() {
                log::error!("Audio capture: {}", e);
            }
        }
    }
}

fn retune(
    radio: &mut Device<dyn Transceiver>,
    channel: &mut DopplerChannel,
    hz: f64,
    resolution_hz: f64,
) {
    if !channel.needs_retune(hz, resolution_hz) {
        return;
    }
    let vfo = channel.vfo;
    if let Some(confirmed) = radio.with(|r| r.tune(vfo, hz)) {
        log::debug!(
            "{:?} on {} -> {:.0} Hz (radio reports {:.0})",
            channel.direction,
            vfo,
            hz,
            confirmed
        );
        channel.record(hz, confirmed);
    }
}
