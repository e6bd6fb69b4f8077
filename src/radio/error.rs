use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("cannot open radio on {device}: {source}")]
    Connection {
        device: String,
        source: serialport::Error,
    },
    #[error("radio I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("radio did not finish its reply ({received} bytes before timeout)")]
    Timeout { received: usize },
    #[error("bad radio frame: {0}")]
    Framing(String),
    #[error("radio rejected command {command:02X}")]
    Rejected { command: u8 },
    #[error("value {0} cannot be encoded for the radio")]
    Value(f64),
}

impl RadioError {
    pub fn is_disconnect(&self) -> bool {
        match self {
            RadioError::Connection { .. } => true,
            RadioError::Io(e) => crate::serial::is_disconnect(e),
            _ => false,
        }
    }
}
