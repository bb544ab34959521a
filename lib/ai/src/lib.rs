//! Assistant primitives for parley.
//!
//! This crate provides:
//!
//! - **Backend**: The assistant session/run and completion traits
//! - **OpenAI**: An implementation of both traits over the OpenAI HTTP API
//! - **Run**: Driving one user turn through a run to a reply
//! - **Escalation**: Replacing "I don't know" replies with web-search answers

pub mod backend;
pub mod error;
pub mod escalation;
pub mod openai;
pub mod prompt;
pub mod run;

pub use backend::{
    AssistantApi, AssistantSpec, CompletionApi, ContentBlock, MessageRole, Run, RunStatus,
    Session, SessionMessage,
};
pub use error::{AssistantError, EscalationError, RunError};
pub use escalation::{SearchEscalator, is_escalation};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompt::{ESCALATION_SENTINEL, PromptTemplate, default_system_prompt};
pub use run::{RunConfig, RunOrchestrator};
