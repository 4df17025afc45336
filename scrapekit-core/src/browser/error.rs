use thiserror::Error;

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("query `{selector}` failed: {message}")]
    Query { selector: String, message: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("element handle {0} is no longer valid")]
    StaleElement(usize),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl DriverError {
    pub fn query(selector: &str, message: impl ToString) -> Self {
        DriverError::Query {
            selector: selector.to_string(),
            message: message.to_string(),
        }
    }
}
