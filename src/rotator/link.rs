use std::io::{Read, Write};

use crate::rotator::frame::{decode_response, CommandFrame, Position, RotatorCommand, RESPONSE_LEN};
use crate::rotator::{Rotator, RotatorError};
use crate::serial;

/// Rotator on a byte transport, one command in flight at a time.
pub struct RotatorLink<T> {
    port: T,
    set_responds: bool,
    last_commanded: Option<Position>,
    last_reported: Option<Position>,
}

impl<T: Read + Write> RotatorLink<T> {
    /// `set_responds` is false for firmware that stays silent after SET.
    pub fn new(port: T, set_responds: bool) -> Self {
        Self {
            port,
            set_responds,
            last_commanded: None,
            last_reported: None,
        }
    }

    #[cfg(test)]
    pub fn last_commanded(&self) -> Option<Position> {
        self.last_commanded
    }

    #[cfg(test)]
    pub fn last_reported(&self) -> Option<Position> {
        self.last_reported
    }

    fn transact(
        &mut self,
        command: RotatorCommand,
        frame: CommandFrame,
        expect_response: bool,
    ) -> Result<Option<Position>, RotatorError> {
        log::debug!("Rotator {} -> {}", command, serial::hex(frame.as_bytes()));
        self.port.write_all(frame.as_bytes())?;
        self.port.flush()?;

        if !expect_response {
            return Ok(None);
        }

        let mut response = [0u8; RESPONSE_LEN];
        let received = serial::read_available(&mut self.port, &mut response)?;
        log::debug!("Rotator {} <- {}", command, serial::hex(&response[..received]));

        let position = decode_response(&response[..received])?;
        self.last_reported = Some(position);
        Ok(Some(position))
    }

    fn reported(&mut self, command: RotatorCommand, frame: CommandFrame) -> Result<Position, RotatorError> {
        self.transact(command, frame, true)?
            .ok_or(RotatorError::ShortResponse(0))
    }
}

impl<T: Read + Write> Rotator for RotatorLink<T> {
    fn stop(&mut self) -> Result<Position, RotatorError> {
        let position = self.reported(RotatorCommand::Stop, CommandFrame::stop())?;
        if let Some(target) = self.last_commanded {
            log::info!(
                "Rotator stopped at az {:.1} el {:.1} (last target az {:.1} el {:.1})",
                position.azimuth_deg,
                position.elevation_deg,
                target.azimuth_deg,
                target.elevation_deg
            );
        }
        Ok(position)
    }

    fn status(&mut self) -> Result<Position, RotatorError> {
        let previous = self.last_reported;
        let position = self.reported(RotatorCommand::Status, CommandFrame::status())?;
        if previous == Some(position) {
            log::trace!("Rotator holding");
        }
        Ok(position)
    }

    fn set(&mut self, target: Position) -> Result<Option<Position>, RotatorError> {
        let frame = CommandFrame::set(target)?;
        let reported = self.transact(RotatorCommand::Set, frame, self.set_responds)?;
        self.last_commanded = Some(target);
        Ok(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotator::frame::encode_response;
    use crate::serial::mock::MockPort;
    use approx::assert_abs_diff_eq;
    use std::io;

    #[test]
    fn status_reads_position() {
        let port = MockPort::new().reply(&encode_response(Position::new(-179.0, 5.0)));
        let mut link = RotatorLink::new(port, true);

        let position = link.status().unwrap();
        assert_abs_diff_eq!(position.azimuth_deg, -179.0, epsilon = 1e-9);
        assert_abs_diff_eq!(position.elevation_deg, 5.0, epsilon = 1e-9);
        assert_eq!(link.last_reported(), Some(position));
        assert_eq!(link.port.written[0][11], 0x1F);
    }

    #[test]
    fn silent_set_does_not_wait() {
        let mut link = RotatorLink::new(MockPort::new(), false);
        let reported = link.set(Position::new(200.0, 30.0)).unwrap();

        assert!(reported.is_none());
        assert_eq!(link.last_commanded(), Some(Position::new(200.0, 30.0)));
        assert_eq!(link.port.written.len(), 1);
        assert_eq!(&link.port.written[0][1..5], b"5600");
    }

    #[test]
    fn responding_set_reports_position() {
        let port = MockPort::new().reply(&encode_response(Position::new(12.0, 3.0)));
        let mut link = RotatorLink::new(port, true);
        let reported = link.set(Position::new(200.0, 30.0)).unwrap();
        assert_eq!(reported, Some(Position::new(12.0, 3.0)));
    }

    #[test]
    fn short_reply_is_an_error() {
        let port = MockPort::new().reply(&[b'W', 3, 6]);
        let mut link = RotatorLink::new(port, true);
        assert!(matches!(link.stop(), Err(RotatorError::ShortResponse(3))));
        assert!(link.last_reported().is_none());
    }

    #[test]
    fn out_of_range_set_is_not_sent() {
        let mut link = RotatorLink::new(MockPort::new(), false);
        assert!(matches!(
            link.set(Position::new(600.0, 10.0)),
            Err(RotatorError::Limit { .. })
        ));
        assert!(link.port.written.is_empty());
        assert!(link.last_commanded().is_none());
    }

    #[test]
    fn broken_pipe_is_a_disconnect() {
        let mut link = RotatorLink::new(MockPort::failing(io::ErrorKind::BrokenPipe), true);
        let err = link.status().unwrap_err();
        assert!(err.is_disconnect());
    }
}
