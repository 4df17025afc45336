use thiserror::Error;

use crate::browser::DriverError;

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("custom extraction failed: {0}")]
    Custom(String),
}

impl ExtractError {
    /// Short, stable label used when reporting a failed run.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Configuration(_) => "configuration",
            ExtractError::Driver(_) => "driver",
            ExtractError::UnsupportedFormat(_) => "unsupported_format",
            ExtractError::Custom(_) => "custom",
        }
    }
}
