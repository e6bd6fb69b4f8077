use std::io;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Opens `device` as 8-N-1 without flow control. Reads block for at most
/// `timeout` before failing with `TimedOut`.
pub fn open(
    device: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, serialport::Error> {
    let port = serialport::new(device, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()?;
    if let Err(e) = port.clear(serialport::ClearBuffer::All) {
        log::debug!("Could not flush {}: {}", device, e);
    }
    log::info!("Opened {} at {} baud", device, baud_rate);
    Ok(port)
}

/// Reads until `buf` is full, the device stops sending, or the port read
/// timeout expires. Returns the number of bytes read.
pub fn read_available<R: io::Read + ?Sized>(port: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match port.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// I/O failures that mean the device is gone rather than misbehaving.
pub fn is_disconnect(err: &io::Error) -> bool {
    const EIO: i32 = 5;
    const ENXIO: i32 = 6;
    const ENODEV: i32 = 19;

    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::UnexpectedEof
    ) || matches!(err.raw_os_error(), Some(EIO | ENXIO | ENODEV))
}

pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::io;

    /// Scripted serial device: every write queues the next canned reply
    /// for reading. An empty reader times out like a real port.
    #[derive(Debug, Default)]
    pub struct MockPort {
        pub written: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
        pending: VecDeque<u8>,
        fail: Option<io::ErrorKind>,
    }

    impl MockPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(mut self, bytes: &[u8]) -> Self {
            self.replies.push_back(bytes.to_vec());
            self
        }

        pub fn failing(kind: io::ErrorKind) -> Self {
            Self {
                fail: Some(kind),
                ..Self::default()
            }
        }
    }

    impl io::Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.fail {
                return Err(io::Error::from(kind));
            }
            self.written.push(buf.to_vec());
            if let Some(reply) = self.replies.pop_front() {
                self.pending.extend(reply);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl io::Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            let n = buf.len().min(self.pending.len());
            for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPort;
    use super::*;
    use std::io::Write;

    #[test]
    fn read_available_stops_at_timeout() {
        let mut port = MockPort::new().reply(&[1, 2, 3]);
        port.write_all(&[0]).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(read_available(&mut port, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn classifies_disconnects() {
        assert!(is_disconnect(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_disconnect(&io::Error::from_raw_os_error(5)));
        assert!(!is_disconnect(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_disconnect(&io::Error::from(io::ErrorKind::InvalidData)));
    }

    #[test]
    fn hex_dump() {
        assert_eq!(hex(&[0xFE, 0x0A, 0x00]), "FE 0A 00");
    }
}
