//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Failure of one streaming exchange, with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::new(
            TransportErrorKind::Status(status),
            format!("HTTP error! status: {status}"),
        )
    }

    pub fn missing_body() -> Self {
        Self::new(TransportErrorKind::MissingBody, "No response body")
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("Request timed out after {} seconds", after.as_secs()),
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Timeout)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            TransportError::network(format!("Connection failed: {e}"))
        } else if let Some(status) = e.status() {
            TransportError::status(status.as_u16())
        } else {
            TransportError::network(format!("Request failed: {e}"))
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Server answered with a non-success status
    Status(u16),
    /// Success status but nothing to read
    MissingBody,
    /// Connection or read failure
    Network,
    /// Exchange exceeded its wall-clock deadline
    Timeout,
}
