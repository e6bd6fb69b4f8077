use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotatorError {
    #[error("cannot open rotator on {device}: {source}")]
    Connection {
        device: String,
        source: serialport::Error,
    },
    #[error("rotator I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("short rotator response: {0} of 12 bytes")]
    ShortResponse(usize),
    #[error("malformed rotator response: {0}")]
    Protocol(String),
    #[error("pointing request az {azimuth_deg:.1} el {elevation_deg:.1} outside rotator limits")]
    Limit {
        azimuth_deg: f64,
        elevation_deg: f64,
    },
}

impl RotatorError {
    pub fn is_disconnect(&self) -> bool {
        match self {
            RotatorError::Connection { .. } => true,
            RotatorError::Io(e) => crate::serial::is_disconnect(e),
            _ => false,
        }
    }
}
