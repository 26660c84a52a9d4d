use std::time::Duration;
use thiserror::Error;

/// Failures raised by a capture session.
///
/// Display strings carry the vocabulary the recovery classifier keys on.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Click intercepted by overlay: {0}")]
    Blocked(String),

    #[error("Timeout {}ms exceeded: {context}", elapsed.as_millis())]
    Timeout { elapsed: Duration, context: String },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Navigation failed: invalid URL {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Capture session closed")]
    SessionClosed,

    #[error("Other error: {0}")]
    Other(String),
}

impl CaptureError {
    pub fn timeout(elapsed: Duration, context: impl Into<String>) -> Self {
        CaptureError::Timeout {
            elapsed,
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
