//! OpenAI implementation of the assistant traits.
//!
//! Sessions map to Assistants v2 threads; single-turn completions use the
//! chat completions endpoint.

use crate::backend::{
    AssistantApi, AssistantSpec, CompletionApi, ContentBlock, MessageRole, Run, RunStatus,
    Session, SessionMessage,
};
use crate::error::AssistantError;
use async_trait::async_trait;
use parley_core::{AssistantId, RunId, SessionId};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model for provisioning and completions.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const ASSISTANTS_BETA_HEADER: &str = "OpenAI-Beta";
const ASSISTANTS_BETA_VERSION: &str = "assistants=v2";

/// Configuration for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL, without trailing slash.
    pub api_base: String,
    /// Model used for single-turn completions.
    pub completion_model: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    /// Creates a configuration for the public API with default settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            completion_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Overrides the completion model.
    #[must_use]
    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    thread_id: String,
    status: RunStatus,
}

impl From<RunObject> for Run {
    fn from(run: RunObject) -> Self {
        Self {
            id: RunId::new(run.id),
            session_id: SessionId::new(run.thread_id),
            status: run.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: MessageRole,
    #[serde(default)]
    content: Vec<ContentObject>,
}

#[derive(Debug, Deserialize)]
struct ContentObject {
    #[serde(rename = "type")]
    kind: String,
    text: Option<TextObject>,
}

#[derive(Debug, Deserialize)]
struct TextObject {
    value: String,
}

impl From<MessageObject> for SessionMessage {
    fn from(message: MessageObject) -> Self {
        let content = message
            .content
            .into_iter()
            .map(|block| match (block.kind.as_str(), block.text) {
                ("text", Some(text)) => ContentBlock::Text(text.value),
                _ => ContentBlock::Other(block.kind),
            })
            .collect();
        Self {
            role: message.role,
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for the OpenAI HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    completion_model: String,
}

impl OpenAiClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, AssistantError> {
        let api_key = config.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(AssistantError::InvalidConfig {
                reason: "API key is empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AssistantError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            completion_model: config.completion_model,
        })
    }

    fn assistants_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER, ASSISTANTS_BETA_VERSION)
    }

    async fn send(
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AssistantError> {
        request
            .send()
            .await
            .map_err(|e| AssistantError::RequestFailed {
                operation: operation.to_string(),
                reason: e.to_string(),
            })
    }

    async fn decode<T: DeserializeOwned>(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T, AssistantError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::ApiError {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AssistantError::ResponseParseFailed {
                operation: operation.to_string(),
                reason: e.to_string(),
            })
    }

    async fn request_json<T: DeserializeOwned>(
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AssistantError> {
        let response = Self::send(operation, request).await?;
        Self::decode(operation, response).await
    }
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    #[instrument(skip(self))]
    async fn create_session(&self) -> Result<SessionId, AssistantError> {
        let thread: ObjectId = Self::request_json(
            "create_thread",
            self.assistants_request(reqwest::Method::POST, "/threads")
                .json(&json!({})),
        )
        .await?;

        debug!(session_id = %thread.id, "Created thread");
        Ok(SessionId::new(thread.id))
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, AssistantError> {
        let operation = "retrieve_thread";
        let response = Self::send(
            operation,
            self.assistants_request(reqwest::Method::GET, &format!("/threads/{id}")),
        )
        .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Thread no longer exists");
            return Ok(None);
        }

        let thread: ObjectId = Self::decode(operation, response).await?;
        Ok(Some(Session {
            id: SessionId::new(thread.id),
        }))
    }

    #[instrument(skip(self, text), fields(session_id = %session_id, role = role.as_str()))]
    async fn append_message(
        &self,
        session_id: &SessionId,
        role: MessageRole,
        text: &str,
    ) -> Result<(), AssistantError> {
        let _message: ObjectId = Self::request_json(
            "create_message",
            self.assistants_request(
                reqwest::Method::POST,
                &format!("/threads/{session_id}/messages"),
            )
            .json(&json!({ "role": role.as_str(), "content": text })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, instructions), fields(session_id = %session_id, assistant_id = %assistant_id))]
    async fn start_run(
        &self,
        session_id: &SessionId,
        assistant_id: &AssistantId,
        instructions: &str,
    ) -> Result<Run, AssistantError> {
        let run: RunObject = Self::request_json(
            "create_run",
            self.assistants_request(reqwest::Method::POST, &format!("/threads/{session_id}/runs"))
                .json(&json!({
                    "assistant_id": assistant_id.as_str(),
                    "instructions": instructions,
                })),
        )
        .await?;

        debug!(run_id = %run.id, status = %run.status, "Started run");
        Ok(run.into())
    }

    #[instrument(skip(self), fields(session_id = %session_id, run_id = %run_id))]
    async fn get_run(
        &self,
        session_id: &SessionId,
        run_id: &RunId,
    ) -> Result<Run, AssistantError> {
        let run: RunObject = Self::request_json(
            "retrieve_run",
            self.assistants_request(
                reqwest::Method::GET,
                &format!("/threads/{session_id}/runs/{run_id}"),
            ),
        )
        .await?;
        Ok(run.into())
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn list_messages(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<SessionMessage>, AssistantError> {
        let list: MessageList = Self::request_json(
            "list_messages",
            self.assistants_request(
                reqwest::Method::GET,
                &format!("/threads/{session_id}/messages"),
            )
            .query(&[("order", "desc")]),
        )
        .await?;

        Ok(list.data.into_iter().map(SessionMessage::from).collect())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, model = %spec.model))]
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, AssistantError> {
        let assistant: ObjectId = Self::request_json(
            "create_assistant",
            self.assistants_request(reqwest::Method::POST, "/assistants")
                .json(&json!({
                    "name": spec.name,
                    "model": spec.model,
                    "instructions": spec.instructions,
                })),
        )
        .await?;

        debug!(assistant_id = %assistant.id, "Created assistant");
        Ok(AssistantId::new(assistant.id))
    }
}

#[async_trait]
impl CompletionApi for OpenAiClient {
    #[instrument(skip(self, prompt), fields(model = %self.completion_model))]
    async fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
        let completion: ChatCompletion = Self::request_json(
            "chat_completion",
            self.http
                .post(format!("{}/chat/completions", self.api_base))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.completion_model,
                    "messages": [{ "role": "user", "content": prompt }],
                })),
        )
        .await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AssistantError::EmptyCompletion)
    }
}
