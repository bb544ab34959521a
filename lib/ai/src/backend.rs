//! Assistant backend abstraction.
//!
//! The relay talks to a hosted assistant through two narrow interfaces:
//! [`AssistantApi`] for stateful sessions and runs, and [`CompletionApi`] for
//! single-turn completions outside any session.

use crate::error::AssistantError;
use async_trait::async_trait;
use parley_core::{AssistantId, RunId, SessionId};
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
}

impl MessageRole {
    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Status of an assistant run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    Completed,
    RequiresAction,
    Cancelled,
    Failed,
    Expired,
    Incomplete,
    /// A status this client does not know about.
    #[serde(untagged)]
    Other(String),
}

impl RunStatus {
    /// Returns true while the run may still change status on its own.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }

    /// Returns true if the run finished successfully.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::RequiresAction => "requires_action",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Other(status) => status,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single assistant run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// The run identifier.
    pub id: RunId,
    /// The session the run executes against.
    pub session_id: SessionId,
    /// Current status.
    pub status: RunStatus,
}

/// A block of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// Any non-text block (images, files); carries the block type.
    Other(String),
}

/// A message stored in an assistant session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    /// Who wrote the message.
    pub role: MessageRole,
    /// Content blocks in order.
    pub content: Vec<ContentBlock>,
}

impl SessionMessage {
    /// Creates a message holding a single text block.
    #[must_use]
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// Returns the primary text of the message: its first content block,
    /// when that block is text.
    #[must_use]
    pub fn primary_text(&self) -> Option<&str> {
        match self.content.first() {
            Some(ContentBlock::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// A remote assistant session, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The session identifier.
    pub id: SessionId,
}

/// Parameters for provisioning an assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSpec {
    /// Display name.
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// Default instructions.
    pub instructions: String,
}

/// Stateful assistant sessions and runs.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Creates a new, empty session.
    async fn create_session(&self) -> Result<SessionId, AssistantError>;

    /// Looks a session up; `Ok(None)` means the provider no longer knows it.
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, AssistantError>;

    /// Appends a message to a session.
    async fn append_message(
        &self,
        session_id: &SessionId,
        role: MessageRole,
        text: &str,
    ) -> Result<(), AssistantError>;

    /// Starts a run of `assistant_id` against a session.
    async fn start_run(
        &self,
        session_id: &SessionId,
        assistant_id: &AssistantId,
        instructions: &str,
    ) -> Result<Run, AssistantError>;

    /// Fetches the current state of a run.
    async fn get_run(&self, session_id: &SessionId, run_id: &RunId)
    -> Result<Run, AssistantError>;

    /// Lists the session's messages, most recent first.
    async fn list_messages(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<SessionMessage>, AssistantError>;

    /// Provisions a new assistant.
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, AssistantError>;
}

/// Single-turn completions outside any session.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Completes `prompt` and returns the first choice's text.
    async fn complete(&self, prompt: &str) -> Result<String, AssistantError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_statuses() {
        assert!(RunStatus::Queued.is_pending());
        assert!(RunStatus::InProgress.is_pending());
        assert!(RunStatus::Cancelling.is_pending());
        assert!(!RunStatus::Completed.is_pending());
        assert!(!RunStatus::RequiresAction.is_pending());
        assert!(!RunStatus::Other("paused".to_string()).is_pending());
    }

    #[test]
    fn run_status_deserializes_unknown_values() {
        let status: RunStatus = serde_json::from_str("\"in_progress\"").expect("known");
        assert_eq!(status, RunStatus::InProgress);

        let status: RunStatus = serde_json::from_str("\"paused\"").expect("unknown");
        assert_eq!(status, RunStatus::Other("paused".to_string()));
        assert_eq!(status.to_string(), "paused");
    }

    #[test]
    fn primary_text_uses_first_block_only() {
        let message = SessionMessage {
            role: MessageRole::Assistant,
            content: vec![
                ContentBlock::Text("first".to_string()),
                ContentBlock::Text("second".to_string()),
            ],
        };
        assert_eq!(message.primary_text(), Some("first"));

        let image_first = SessionMessage {
            role: MessageRole::Assistant,
            content: vec![
                ContentBlock::Other("image_file".to_string()),
                ContentBlock::Text("caption".to_string()),
            ],
        };
        assert_eq!(image_first.primary_text(), None);
    }
}
