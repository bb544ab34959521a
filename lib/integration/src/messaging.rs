//! Chat platform messaging.
//!
//! [`MessagingApi`] is the narrow surface the relay needs from the chat
//! platform: post a (possibly threaded) message and read the root post of a
//! thread. [`SlackClient`] implements it over the Slack Web API.

use crate::error::MessagingError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Confirmation of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Channel the message landed in.
    pub channel: String,
    /// Timestamp id of the posted message.
    pub ts: String,
}

/// Outbound messaging operations.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Posts `text` to `channel`, as a threaded reply when `thread_ts` is set.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<DeliveryReceipt, MessagingError>;

    /// Returns the text of the root post of a thread, if it exists.
    async fn fetch_thread_root(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Option<String>, MessagingError>;
}

/// Configuration for [`SlackClient`].
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-...`).
    pub bot_token: String,
    /// Web API base URL, without trailing slash.
    pub api_base: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl SlackConfig {
    /// Creates a configuration for the public Web API.
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    channel: Option<String>,
    ts: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<ThreadMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    ts: String,
    #[serde(default)]
    text: String,
}

/// Slack Web API client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the HTTP client cannot be built.
    pub fn new(config: SlackConfig) -> Result<Self, MessagingError> {
        let bot_token = config.bot_token.trim().to_string();
        if bot_token.is_empty() {
            return Err(MessagingError::InvalidConfig {
                reason: "bot token is empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MessagingError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    async fn request_json<T: DeserializeOwned>(
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, MessagingError> {
        let response = request
            .send()
            .await
            .map_err(|e| MessagingError::ConnectionFailed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessagingError::HttpStatus {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MessagingError::ProtocolError {
                method: method.to_string(),
                reason: e.to_string(),
            })
    }

    fn rejected(method: &str, error: Option<String>) -> MessagingError {
        MessagingError::Rejected {
            method: method.to_string(),
            error: error.unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}

#[async_trait]
impl MessagingApi for SlackClient {
    #[instrument(skip(self, text))]
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<DeliveryReceipt, MessagingError> {
        let method = "chat.postMessage";
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let response: PostMessageResponse = Self::request_json(
            method,
            self.http
                .post(format!("{}/{method}", self.api_base))
                .bearer_auth(&self.bot_token)
                .json(&payload),
        )
        .await?;

        if !response.ok {
            return Err(Self::rejected(method, response.error));
        }

        let ts = response.ts.ok_or_else(|| MessagingError::ProtocolError {
            method: method.to_string(),
            reason: "response missing ts".to_string(),
        })?;
        debug!(ts = %ts, "Message posted");

        Ok(DeliveryReceipt {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_thread_root(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Option<String>, MessagingError> {
        let method = "conversations.replies";
        let response: RepliesResponse = Self::request_json(
            method,
            self.http
                .get(format!("{}/{method}", self.api_base))
                .bearer_auth(&self.bot_token)
                .query(&[("channel", channel), ("ts", thread_ts), ("limit", "1")]),
        )
        .await?;

        if !response.ok {
            if response.error.as_deref() == Some("thread_not_found") {
                return Ok(None);
            }
            return Err(Self::rejected(method, response.error));
        }

        Ok(response
            .messages
            .into_iter()
            .find(|message| message.ts == thread_ts)
            .map(|message| message.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::new(SlackConfig::new("xoxb-test").with_api_base(server.base_url()))
            .expect("client")
    }

    #[test]
    fn rejects_empty_token() {
        let err = SlackClient::new(SlackConfig::new("")).unwrap_err();
        assert!(matches!(err, MessagingError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn post_message_in_thread() {
        let server = MockServer::start_async().await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat.postMessage")
                    .header("authorization", "Bearer xoxb-test")
                    .body_includes("\"thread_ts\":\"1700000000.000100\"");
                then.status(200)
                    .json_body(json!({ "ok": true, "channel": "C1", "ts": "1700000001.000200" }));
            })
            .await;

        let receipt = client(&server)
            .post_message("C1", "hello", Some("1700000000.000100"))
            .await
            .expect("post");
        assert_eq!(
            receipt,
            DeliveryReceipt {
                channel: "C1".to_string(),
                ts: "1700000001.000200".to_string(),
            }
        );
        post.assert_async().await;
    }

    #[tokio::test]
    async fn post_message_surfaces_api_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postMessage");
                then.status(200)
                    .json_body(json!({ "ok": false, "error": "channel_not_found" }));
            })
            .await;

        let err = client(&server)
            .post_message("C404", "hello", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MessagingError::Rejected {
                method: "chat.postMessage".to_string(),
                error: "channel_not_found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn fetch_thread_root_returns_root_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/conversations.replies")
                    .query_param("channel", "C1")
                    .query_param("ts", "100.1");
                then.status(200).json_body(json!({
                    "ok": true,
                    "messages": [
                        { "ts": "100.1", "text": "<@UBOT> can you help?" }
                    ]
                }));
            })
            .await;

        let root = client(&server)
            .fetch_thread_root("C1", "100.1")
            .await
            .expect("fetch");
        assert_eq!(root.as_deref(), Some("<@UBOT> can you help?"));
    }

    #[tokio::test]
    async fn fetch_thread_root_missing_thread() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/conversations.replies");
                then.status(200)
                    .json_body(json!({ "ok": false, "error": "thread_not_found" }));
            })
            .await;

        let root = client(&server)
            .fetch_thread_root("C1", "100.1")
            .await
            .expect("fetch");
        assert!(root.is_none());
    }

    #[tokio::test]
    async fn http_failure_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/conversations.replies");
                then.status(500);
            })
            .await;

        let err = client(&server)
            .fetch_thread_root("C1", "100.1")
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::HttpStatus { status: 500, .. }));
    }
}
