mod error;
mod frame;
mod link;

use std::time::Duration;

pub use error::RotatorError;
pub use frame::{Position, AZIMUTH_MAX_DEG, AZIMUTH_MIN_DEG, ELEVATION_MAX_DEG, ELEVATION_MIN_DEG};
pub use link::RotatorLink;

#[cfg(test)]
pub(crate) use frame::encode_response;

/// Antenna rotator as seen by the tracking controller.
pub trait Rotator {
    fn stop(&mut self) -> Result<Position, RotatorError>;
    fn status(&mut self) -> Result<Position, RotatorError>;
    /// `None` when the firmware does not answer SET.
    fn set(&mut self, target: Position) -> Result<Option<Position>, RotatorError>;
}

pub fn connect(
    device: &str,
    baud_rate: u32,
    timeout: Duration,
    set_responds: bool,
) -> Result<RotatorLink<Box<dyn serialport::SerialPort>>, RotatorError> {
    let port = crate::serial::open(device, baud_rate, timeout).map_err(|source| {
        RotatorError::Connection {
            device: device.to_string(),
            source,
        }
    })?;
    Ok(RotatorLink::new(port, set_responds))
}
