use serde::Serialize;
use strum_macros::Display;

use crate::rotator::RotatorError;

pub const COMMAND_LEN: usize = 13;
pub const RESPONSE_LEN: usize = 12;

pub const AZIMUTH_MIN_DEG: f64 = -179.0;
pub const AZIMUTH_MAX_DEG: f64 = 539.0;
pub const ELEVATION_MIN_DEG: f64 = 0.0;
pub const ELEVATION_MAX_DEG: f64 = 90.0;

const FRAME_START: u8 = b'W';
const FRAME_END: u8 = b' ';
const ANGLE_OFFSET_DEG: f64 = 360.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RotatorCommand {
    #[strum(serialize = "STOP")]
    Stop,
    #[strum(serialize = "STATUS")]
    Status,
    #[strum(serialize = "SET")]
    Set,
}

impl RotatorCommand {
    pub fn code(self) -> u8 {
        match self {
            RotatorCommand::Stop => 0x0F,
            RotatorCommand::Status => 0x1F,
            RotatorCommand::Set => 0x2F,
        }
    }
}

/// Antenna pointing in rotator coordinates. Azimuth may exceed one turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

impl Position {
    pub fn new(azimuth_deg: f64, elevation_deg: f64) -> Self {
        Self {
            azimuth_deg,
            elevation_deg,
        }
    }

    pub fn home() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn within_limits(&self) -> bool {
        (AZIMUTH_MIN_DEG..=AZIMUTH_MAX_DEG).contains(&self.azimuth_deg)
            && (ELEVATION_MIN_DEG..=ELEVATION_MAX_DEG).contains(&self.elevation_deg)
    }

    pub fn clamp(&self) -> Self {
        Self::new(
            self.azimuth_deg.clamp(AZIMUTH_MIN_DEG, AZIMUTH_MAX_DEG),
            self.elevation_deg.clamp(ELEVATION_MIN_DEG, ELEVATION_MAX_DEG),
        )
    }

    /// Rejects requests outside the mechanical range instead of clamping.
    pub fn checked(self) -> Result<Self, RotatorError> {
        if self.within_limits() {
            Ok(self)
        } else {
            Err(RotatorError::Limit {
                azimuth_deg: self.azimuth_deg,
                elevation_deg: self.elevation_deg,
            })
        }
    }
}

/// `W AAAA 0 EEEE 0 K ' '`, angles as four ASCII digits of tenths of a
/// degree offset by 360. STOP and STATUS carry zero digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; COMMAND_LEN]);

impl CommandFrame {
    pub fn stop() -> Self {
        Self::build(RotatorCommand::Stop, None)
    }

    pub fn status() -> Self {
        Self::build(RotatorCommand::Status, None)
    }

    pub fn set(target: Position) -> Result<Self, RotatorError> {
        let target = target.checked()?;
        Ok(Self::build(RotatorCommand::Set, Some(target.clamp())))
    }

    fn build(command: RotatorCommand, target: Option<Position>) -> Self {
        let mut bytes = [b'0'; COMMAND_LEN];
        bytes[0] = FRAME_START;
        if let Some(target) = target {
            bytes[1..5].copy_from_slice(&encode_angle(target.azimuth_deg));
            bytes[6..10].copy_from_slice(&encode_angle(target.elevation_deg));
        }
        bytes[5] = 0x00;
        bytes[10] = 0x00;
        bytes[11] = command.code();
        bytes[12] = FRAME_END;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

fn encode_angle(angle_deg: f64) -> [u8; 4] {
    let tenths = (10.0 * (angle_deg + ANGLE_OFFSET_DEG)).round().clamp(0.0, 9999.0) as u32;
    [
        b'0' + (tenths / 1000 % 10) as u8,
        b'0' + (tenths / 100 % 10) as u8,
        b'0' + (tenths / 10 % 10) as u8,
        b'0' + (tenths % 10) as u8,
    ]
}

/// Position reply. Digits are raw 0-9 values: hundreds, tens, units, tenths.
pub fn decode_response(bytes: &[u8]) -> Result<Position, RotatorError> {
    if bytes.len() < RESPONSE_LEN {
        return Err(RotatorError::ShortResponse(bytes.len()));
    }
    if bytes[0] != FRAME_START {
        return Err(RotatorError::Protocol(format!(
            "unexpected start byte {:02X}",
            bytes[0]
        )));
    }
    Ok(Position::new(
        decode_angle(&bytes[1..5])?,
        decode_angle(&bytes[6..10])?,
    ))
}

fn decode_angle(digits: &[u8]) -> Result<f64, RotatorError> {
    if let Some(bad) = digits.iter().find(|d| **d > 9) {
        return Err(RotatorError::Protocol(format!("invalid digit {:02X}", bad)));
    }
    let whole = digits[0] as f64 * 100.0 + digits[1] as f64 * 10.0 + digits[2] as f64;
    Ok(whole + digits[3] as f64 / 10.0 - ANGLE_OFFSET_DEG)
}

#[cfg(test)]
pub(crate) fn encode_response(position: Position) -> [u8; RESPONSE_LEN] {
    let digits = |angle: f64| {
        let tenths = (10.0 * (angle + ANGLE_OFFSET_DEG)).round() as u32;
        [
            (tenths / 1000 % 10) as u8,
            (tenths / 100 % 10) as u8,
            (tenths / 10 % 10) as u8,
            (tenths % 10) as u8,
        ]
    };
    let mut bytes = [0u8; RESPONSE_LEN];
    bytes[0] = FRAME_START;
    bytes[1..5].copy_from_slice(&digits(position.azimuth_deg));
    bytes[5] = 0x0A;
    bytes[6..10].copy_from_slice(&digits(position.elevation_deg));
    bytes[10] = 0x0A;
    bytes[11] = FRAME_END;
    bytes
}
