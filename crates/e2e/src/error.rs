//! Error types for the harness engine

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("WebDriver error ({code}): {message}")]
    WebDriver { code: String, message: String },

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for {what} after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether this failure comes from a DOM reference invalidated by a re-render
    pub fn is_stale(&self) -> bool {
        match self {
            E2eError::StaleElement(_) => true,
            E2eError::WebDriver { message, .. } => {
                message.contains("stale") || message.contains("Stale")
            }
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
