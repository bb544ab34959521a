//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StoreError`: Errors from key-value persistence backends
//! - `SessionError`: Errors resolving a conversation's assistant session
//! - `RelayError`: High-level wrapper for context while handling an event

use crate::context::ConversationKey;
use parley_core::SessionId;
use std::fmt;

/// Errors from key-value store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading from the backend failed.
    ReadFailed { reason: String },
    /// Writing to the backend failed.
    WriteFailed { key: String, reason: String },
    /// Stored data could not be decoded.
    Corrupt { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { reason } => write!(f, "store read failed: {reason}"),
            Self::WriteFailed { key, reason } => {
                write!(f, "store write for '{key}' failed: {reason}")
            }
            Self::Corrupt { reason } => write!(f, "stored data is corrupt: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from session resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Loading persisted mappings failed (use as context wrapper).
    Load,
    /// Creating a session failed (use as context wrapper).
    Create { key: ConversationKey },
    /// Verifying a stored session failed (use as context wrapper).
    Verify {
        key: ConversationKey,
        session_id: SessionId,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "failed to load session mappings"),
            Self::Create { key } => write!(f, "failed to create session for {key}"),
            Self::Verify { key, session_id } => {
                write!(f, "failed to verify session {session_id} for {key}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// High-level relay errors.
///
/// Use these to add context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// No session could be resolved (use as context wrapper).
    SessionUnavailable { key: ConversationKey },
    /// The assistant run produced no reply (use as context wrapper).
    RunFailed { key: ConversationKey },
    /// Web-search escalation failed (use as context wrapper).
    EscalationFailed { key: ConversationKey },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionUnavailable { key } => write!(f, "no session available for {key}"),
            Self::RunFailed { key } => write!(f, "assistant run failed for {key}"),
            Self::EscalationFailed { key } => write!(f, "search escalation failed for {key}"),
        }
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::WriteFailed {
            key: "U1-DM".to_string(),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("U1-DM"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn session_error_display() {
        let err = SessionError::Verify {
            key: ConversationKey::from_persisted("U1-C1"),
            session_id: SessionId::new("thread_1"),
        };
        assert!(err.to_string().contains("thread_1"));
        assert!(err.to_string().contains("U1-C1"));
    }

    #[test]
    fn relay_error_display() {
        let err = RelayError::RunFailed {
            key: ConversationKey::from_persisted("U1-DM"),
        };
        assert!(err.to_string().contains("U1-DM"));
    }
}
