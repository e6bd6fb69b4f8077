mod error;
mod frame;
mod link;

use std::time::Duration;

pub use error::RadioError;
pub use link::{OperatingMode, RadioLink, Vfo};

/// Radio operations the tracking controller relies on.
pub trait Transceiver {
    fn set_satellite_mode(&mut self, enabled: bool) -> Result<(), RadioError>;

    /// Selects `vfo`, sets it to `hz` and returns the frequency the radio
    /// reports back.
    fn tune(&mut self, vfo: Vfo, hz: f64) -> Result<f64, RadioError>;
}

pub fn connect(
    device: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<RadioLink<Box<dyn serialport::SerialPort>>, RadioError> {
    let port = crate::serial::open(device, baud_rate, timeout).map_err(|source| {
        RadioError::Connection {
            device: device.to_string(),
            source,
        }
    })?;
    Ok(RadioLink::new(port))
}
