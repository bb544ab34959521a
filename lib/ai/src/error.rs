//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AssistantError`: Low-level assistant/completion API operations
//! - `RunError`: Driving a single run to completion (wraps `AssistantError`)
//! - `EscalationError`: The web-search fallback

use parley_core::{RunId, SessionId};
use std::fmt;

/// Errors from assistant API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// The HTTP request could not be sent or completed.
    RequestFailed { operation: String, reason: String },
    /// The API answered with a non-success status.
    ApiError {
        operation: String,
        status: u16,
        body: String,
    },
    /// The response body did not have the expected shape.
    ResponseParseFailed { operation: String, reason: String },
    /// A completion returned no choices.
    EmptyCompletion,
    /// Invalid client configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { operation, reason } => {
                write!(f, "assistant request '{operation}' failed: {reason}")
            }
            Self::ApiError {
                operation,
                status,
                body,
            } => {
                write!(
                    f,
                    "assistant request '{operation}' returned status {status}: {body}"
                )
            }
            Self::ResponseParseFailed { operation, reason } => {
                write!(f, "failed to parse '{operation}' response: {reason}")
            }
            Self::EmptyCompletion => write!(f, "completion returned no choices"),
            Self::InvalidConfig { reason } => {
                write!(f, "invalid assistant configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for AssistantError {}

/// Errors from driving an assistant run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Appending the user turn failed (use as context wrapper).
    AppendMessage { session_id: SessionId },
    /// Starting the run failed (use as context wrapper).
    StartRun { session_id: SessionId },
    /// Polling the run failed (use as context wrapper).
    PollRun { run_id: RunId },
    /// Fetching the reply failed (use as context wrapper).
    FetchReply { session_id: SessionId },
    /// The run reached a terminal status other than `completed`.
    Unsuccessful { run_id: RunId, status: String },
    /// The run did not reach a terminal status within the polling budget.
    TimedOut { run_id: RunId, attempts: u32 },
    /// The run completed but the newest message carried no text.
    EmptyReply { session_id: SessionId },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppendMessage { session_id } => {
                write!(f, "failed to append message to session {session_id}")
            }
            Self::StartRun { session_id } => {
                write!(f, "failed to start run on session {session_id}")
            }
            Self::PollRun { run_id } => write!(f, "failed to poll run {run_id}"),
            Self::FetchReply { session_id } => {
                write!(f, "failed to fetch reply from session {session_id}")
            }
            Self::Unsuccessful { run_id, status } => {
                write!(f, "run {run_id} ended with status '{status}'")
            }
            Self::TimedOut { run_id, attempts } => {
                write!(f, "run {run_id} did not complete after {attempts} polls")
            }
            Self::EmptyReply { session_id } => {
                write!(f, "latest message in session {session_id} has no text")
            }
        }
    }
}

impl std::error::Error for RunError {}

/// Errors from the web-search fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationError {
    /// The web search failed (use as context wrapper).
    Search { query: String },
    /// The restating completion failed (use as context wrapper).
    Completion,
}

impl fmt::Display for EscalationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search { query } => write!(f, "web search for '{query}' failed"),
            Self::Completion => write!(f, "restating search results failed"),
        }
    }
}

impl std::error::Error for EscalationError {}
