use thiserror::Error;

use crate::capture::CaptureError;
use crate::predict::PredictError;
use crate::radio::RadioError;
use crate::rotator::RotatorError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("command locked; unlock first")]
    Locked,
    #[error("predict error: {0}")]
    Predict(#[from] PredictError),
    #[error("rotator error: {0}")]
    Rotator(#[from] RotatorError),
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
}
