//! Completion error types

use thiserror::Error;

/// Failure of the remote completion service
///
/// Every kind is reported to the user the same way; the kind only feeds
/// logging.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Timeout, message)
    }

    pub fn status(status: u16) -> Self {
        Self {
            kind: CompletionErrorKind::Status,
            message: format!("HTTP error! Status: {status}"),
            status: Some(status),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::new(CompletionErrorKind::Shape, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Connection or transport failure
    Network,
    /// No answer within the configured timeout
    Timeout,
    /// Non-2xx response
    Status,
    /// 2xx response without `candidates[0].content.parts[0].text`
    Shape,
}
