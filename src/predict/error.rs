use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog read error: {0}")]
    Read(#[from] std::io::Error),
    #[error("satellite '{0}' not found in catalog")]
    NotFound(String),
    #[error("invalid elements for '{name}': {message}")]
    InvalidElements { name: String, message: String },
    #[error("truncated record for '{0}'")]
    Truncated(String),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("propagation error: {0}")]
    Propagation(String),
    #[error("invalid name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("pass sweep did not reach loss of signal within {0} minutes")]
    SweepIncomplete(f64),
    #[error("search step must be positive, got {0} minutes")]
    InvalidStep(f64),
    #[error("write error: {0}")]
    Write(#[from] std::io::Error),
}

impl From<sgp4::Error> for PredictError {
    fn from(err: sgp4::Error) -> Self {
        PredictError::Propagation(err.to_string())
    }
}
