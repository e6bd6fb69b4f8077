use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::radio::frame::{
    decode_bcd, decode_frequency, encode_frequency, parse_response, CommandFrame, DigitOrder,
    Reply, COMMAND_PREAMBLE, MAX_RESPONSE_LEN, TERMINATOR,
};
use crate::radio::{RadioError, Transceiver};
use crate::serial;

const CMD_READ_FREQUENCY: u8 = 0x03;
const CMD_SET_FREQUENCY: u8 = 0x05;
const CMD_SET_MODE: u8 = 0x06;
const CMD_VFO: u8 = 0x07;
const CMD_FUNCTION: u8 = 0x16;
const CMD_SCOPE: u8 = 0x27;

const SUB_BAND_SELECTION: u8 = 0xD2;
const SUB_SATELLITE_MODE: u8 = 0x5A;
const SUB_SCOPE_OUTPUT: u8 = 0x11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vfo {
    A,
    B,
    Main,
    Sub,
}

impl Vfo {
    pub fn code(self) -> u8 {
        match self {
            Vfo::A => 0x00,
            Vfo::B => 0x01,
            Vfo::Main => 0xD0,
            Vfo::Sub => 0xD1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    Lsb,
    Usb,
    Am,
    Cw,
    Rtty,
    Fm,
    CwReverse,
    RttyReverse,
    Dv,
}

impl OperatingMode {
    pub fn code(self) -> u8 {
        match self {
            OperatingMode::Lsb => 0x00,
            OperatingMode::Usb => 0x01,
            OperatingMode::Am => 0x02,
            OperatingMode::Cw => 0x03,
            OperatingMode::Rtty => 0x04,
            OperatingMode::Fm => 0x05,
            OperatingMode::CwReverse => 0x07,
            OperatingMode::RttyReverse => 0x08,
            OperatingMode::Dv => 0x17,
        }
    }
}

/// Icom CI-V transceiver on a byte transport.
pub struct RadioLink<T> {
    port: T,
    vfo: Option<Vfo>,
    last_commanded_hz: Option<f64>,
    last_confirmed_hz: Option<f64>,
}

impl<T: Read + Write> RadioLink<T> {
    pub fn new(port: T) -> Self {
        Self {
            port,
            vfo: None,
            last_commanded_hz: None,
            last_confirmed_hz: None,
        }
    }

    #[cfg(test)]
    pub fn last_commanded_hz(&self) -> Option<f64> {
        self.last_commanded_hz
    }

    #[cfg(test)]
    pub fn last_confirmed_hz(&self) -> Option<f64> {
        self.last_confirmed_hz
    }

    /// Sends `frame` and returns the validated reply. A copy of our own frame
    /// read back first (CI-V bus echo) is skipped.
    pub fn command(&mut self, frame: &CommandFrame) -> Result<Reply, RadioError> {
        let bytes = frame.to_bytes();
        log::debug!("Radio -> {}", serial::hex(&bytes));
        self.port.write_all(&bytes)?;
        self.port.flush()?;

        let mut reply = self.read_frame()?;
        if reply.starts_with(&COMMAND_PREAMBLE) {
            if reply != bytes {
                return Err(RadioError::Framing(format!(
                    "unexpected frame on bus: {}",
                    serial::hex(&reply)
                )));
            }
            log::debug!("Radio echo discarded");
            reply = self.read_frame()?;
        }
        log::debug!("Radio <- {}", serial::hex(&reply));

        parse_response(frame, &reply)
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, RadioError> {
        let mut frame = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if serial::read_available(&mut self.port, &mut byte)? == 0 {
                return Err(RadioError::Timeout {
                    received: frame.len(),
                });
            }
            frame.push(byte[0]);
            if byte[0] == TERMINATOR {
                return Ok(frame);
            }
            if frame.len() >= MAX_RESPONSE_LEN {
                return Err(RadioError::Framing("reply exceeds maximum length".to_string()));
            }
        }
    }

    fn acknowledged(&mut self, frame: CommandFrame) -> Result<(), RadioError> {
        match self.command(&frame)? {
            Reply::Ok => Ok(()),
            Reply::Data(data) => Err(RadioError::Framing(format!(
                "unexpected data {} for command {:02X}",
                serial::hex(&data),
                frame.command()
            ))),
        }
    }

    fn data(&mut self, frame: CommandFrame) -> Result<Vec<u8>, RadioError> {
        match self.command(&frame)? {
            Reply::Data(data) if !data.is_empty() => Ok(data),
            _ => Err(RadioError::Framing(format!(
                "no data for command {:02X}",
                frame.command()
            ))),
        }
    }

    fn flag(&mut self, frame: CommandFrame) -> Result<bool, RadioError> {
        let data = self.data(frame)?;
        Ok(decode_bcd(&data[..1], DigitOrder::Forward)? != 0)
    }

    pub fn set_vfo(&mut self, vfo: Vfo) -> Result<(), RadioError> {
        self.acknowledged(CommandFrame::new(CMD_VFO).sub(vfo.code()))?;
        self.vfo = Some(vfo);
        Ok(())
    }

    /// Main or Sub, read from the radio's band selection.
    pub fn vfo(&mut self) -> Result<Vfo, RadioError> {
        let vfo = match self.band_selection()? {
            0 => Vfo::Main,
            _ => Vfo::Sub,
        };
        self.vfo = Some(vfo);
        Ok(vfo)
    }

    pub fn set_frequency(&mut self, hz: f64) -> Result<(), RadioError> {
        let payload = encode_frequency(hz)?;
        self.acknowledged(CommandFrame::new(CMD_SET_FREQUENCY).payload(payload))?;
        self.last_commanded_hz = Some(hz.round());
        Ok(())
    }

    pub fn frequency(&mut self) -> Result<f64, RadioError> {
        let data = self.data(CommandFrame::new(CMD_READ_FREQUENCY))?;
        let hz = decode_frequency(&data)?;
        self.last_confirmed_hz = Some(hz);
        Ok(hz)
    }

    pub fn set_satellite_mode(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.acknowledged(
            CommandFrame::new(CMD_FUNCTION)
                .sub(SUB_SATELLITE_MODE)
                .payload(vec![enabled as u8]),
        )
    }

    pub fn satellite_mode(&mut self) -> Result<bool, RadioError> {
        self.flag(CommandFrame::new(CMD_FUNCTION).sub(SUB_SATELLITE_MODE))
    }

    pub fn set_band_selection(&mut self, band: u8) -> Result<(), RadioError> {
        self.acknowledged(
            CommandFrame::new(CMD_VFO)
                .sub(SUB_BAND_SELECTION)
                .payload(vec![band]),
        )
    }

    pub fn band_selection(&mut self) -> Result<u8, RadioError> {
        let data = self.data(CommandFrame::new(CMD_VFO).sub(SUB_BAND_SELECTION))?;
        Ok(decode_bcd(&data[..1], DigitOrder::Forward)? as u8)
    }

    /// `filter` is the radio's filter slot, 1 to 3.
    pub fn set_mode(&mut self, mode: OperatingMode, filter: u8) -> Result<(), RadioError> {
        if !(1..=3).contains(&filter) {
            return Err(RadioError::Value(filter as f64));
        }
        self.acknowledged(CommandFrame::new(CMD_SET_MODE).payload(vec![mode.code(), filter]))
    }

    /// Reports the radio's state, moves it to the Main band and applies the
    /// configured mode and scope output.
    pub fn prepare(
        &mut self,
        mode: Option<OperatingMode>,
        filter: u8,
        waterfall: bool,
    ) -> Result<(), RadioError> {
        let vfo = self.vfo()?;
        let satellite = self.satellite_mode()?;
        log::info!(
            "Radio on {} band, satellite mode {}",
            vfo,
            if satellite { "on" } else { "off" }
        );
        if vfo != Vfo::Main {
            self.set_band_selection(0)?;
            self.vfo = Some(Vfo::Main);
        }
        if let Some(mode) = mode {
            self.set_mode(mode, filter)?;
            log::info!("Radio mode {} (filter {})", mode, filter);
        }
        self.set_waterfall(waterfall)
    }

    /// Switches the spectrum scope data stream on or off.
    pub fn set_waterfall(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.acknowledged(
            CommandFrame::new(CMD_SCOPE)
                .sub(SUB_SCOPE_OUTPUT)
                .payload(vec![enabled as u8]),
        )
    }
}

impl<T: Read + Write> Transceiver for RadioLink<T> {
    fn set_satellite_mode(&mut self, enabled: bool) -> Result<(), RadioError> {
        RadioLink::set_satellite_mode(self, enabled)
    }

    fn tune(&mut self, vfo: Vfo, hz: f64) -> Result<f64, RadioError> {
        if self.vfo != Some(vfo) {
            self.set_vfo(vfo)?;
        }
        self.set_frequency(hz)?;
        let confirmed = self.frequency()?;
        if let (Some(commanded), Some(reported)) = (self.last_commanded_hz, self.last_confirmed_hz) {
            if commanded != reported {
                log::debug!(
                    "{} set to {:.0} Hz, radio reports {:.0} Hz",
                    vfo,
                    commanded,
                    reported
                );
            }
        }
        Ok(confirmed)
    }
}
