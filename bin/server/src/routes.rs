//! HTTP routes: the Slack Events API endpoint and a health probe.

use crate::error::WebhookRejection;
use crate::signature::{SIGNATURE_HEADER, SignatureVerifier, TIMESTAMP_HEADER};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parley_conversation::{Relay, SlackEnvelope};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The relay every accepted event is handed to.
    pub relay: Arc<Relay>,
    /// Verifies inbound request signatures.
    pub verifier: Arc<SignatureVerifier>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(relay: Arc<Relay>, verifier: SignatureVerifier) -> Self {
        Self {
            relay,
            verifier: Arc::new(verifier),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/event", post(event))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Receives Events API deliveries.
///
/// Events are acknowledged before they are processed; Slack retries anything
/// not acknowledged within a few seconds.
async fn event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookRejection> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    state
        .verifier
        .verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), &body)
        .map_err(WebhookRejection::Unauthorized)?;

    let envelope: SlackEnvelope =
        serde_json::from_slice(&body).map_err(|e| WebhookRejection::Malformed {
            reason: e.to_string(),
        })?;

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => Ok(challenge.into_response()),
        SlackEnvelope::EventCallback { event_id, event } => {
            debug!(event_id = ?event_id, kind = %event.kind, "Accepted event");
            state.relay.spawn_event(event);
            Ok(StatusCode::OK.into_response())
        }
        SlackEnvelope::Unsupported => {
            debug!("Ignoring unsupported envelope");
            Ok(StatusCode::OK.into_response())
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}
