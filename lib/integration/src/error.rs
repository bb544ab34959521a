//! Error types for the integration crate.
//!
//! - `MessagingError`: Errors from the chat platform's Web API
//! - `SearchError`: Errors from the web search API

use std::fmt;

/// Errors from chat platform operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// The HTTP request could not be sent or completed.
    ConnectionFailed { method: String, reason: String },
    /// The API answered with a non-success HTTP status.
    HttpStatus { method: String, status: u16 },
    /// The API answered `ok: false`.
    Rejected { method: String, error: String },
    /// The response body did not have the expected shape.
    ProtocolError { method: String, reason: String },
    /// Invalid client configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { method, reason } => {
                write!(f, "slack {method} request failed: {reason}")
            }
            Self::HttpStatus { method, status } => {
                write!(f, "slack {method} returned HTTP {status}")
            }
            Self::Rejected { method, error } => {
                write!(f, "slack {method} failed: {error}")
            }
            Self::ProtocolError { method, reason } => {
                write!(f, "failed to decode slack {method}: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid messaging configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for MessagingError {}

/// Errors from web search operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The HTTP request could not be sent or completed.
    ConnectionFailed { reason: String },
    /// The API answered with a non-success status.
    HttpStatus { status: u16, body: String },
    /// The response body did not have the expected shape.
    ProtocolError { reason: String },
    /// Invalid client configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "search request failed: {reason}")
            }
            Self::HttpStatus { status, body } => {
                write!(f, "search returned HTTP {status}: {body}")
            }
            Self::ProtocolError { reason } => {
                write!(f, "failed to decode search response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid search configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for SearchError {}
