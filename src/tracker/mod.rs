mod device;
mod doppler;
mod error;
mod parsing;
mod pointing;
mod tracker;
mod types;

pub use error::TrackerError;
pub use parsing::parse_frequency_hz;
pub use tracker::Controller;
pub use types::{AuxiliaryTarget, OperatorCommand, TrackerSettings};
