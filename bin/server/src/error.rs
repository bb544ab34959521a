//! Domain error types for server operations.

use crate::signature::SignatureError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Reasons an inbound webhook request is refused.
#[derive(Debug)]
pub enum WebhookRejection {
    /// The request signature did not verify.
    Unauthorized(SignatureError),
    /// The body is not a recognizable Events API payload.
    Malformed { reason: String },
}

impl fmt::Display for WebhookRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized(e) => write!(f, "request rejected: {e}"),
            Self::Malformed { reason } => write!(f, "unparseable event payload: {reason}"),
        }
    }
}

impl std::error::Error for WebhookRejection {}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized(e) => {
                tracing::warn!(error = %e, "Rejected unsigned or stale request");
                (StatusCode::UNAUTHORIZED, "Invalid request signature")
            }
            Self::Malformed { reason } => {
                tracing::warn!(reason = %reason, "Rejected unparseable event payload");
                (StatusCode::BAD_REQUEST, "Unparseable event payload")
            }
        };

        (status, message).into_response()
    }
}

/// Startup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// Building an API client failed (use as context wrapper).
    Client { service: &'static str },
    /// Connecting to or migrating the database failed (use as context wrapper).
    Database,
    /// Loading persisted session mappings failed (use as context wrapper).
    Sessions,
    /// Creating the assistant failed (use as context wrapper).
    Provision { name: String, model: String },
    /// Binding or serving the listener failed (use as context wrapper).
    Listener { addr: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { service } => write!(f, "failed to build {service} client"),
            Self::Database => write!(f, "failed to prepare the session database"),
            Self::Sessions => write!(f, "failed to load session mappings"),
            Self::Provision { name, model } => {
                write!(f, "failed to create assistant '{name}' on {model}")
            }
            Self::Listener { addr } => write!(f, "listener on {addr} failed"),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_401() {
        let response = WebhookRejection::Unauthorized(SignatureError::Mismatch).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn malformed_maps_to_400() {
        let response = WebhookRejection::Malformed {
            reason: "expected value".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn startup_error_display() {
        let err = StartupError::Provision {
            name: "ChatGPT Helper".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        };
        assert!(err.to_string().contains("ChatGPT Helper"));
    }
}
