//! Run orchestration.
//!
//! One user turn is handled as:
//!
//! 1. Append the user's text to the session.
//! 2. Start a run with the shared system prompt plus an instruction to
//!    address the actor by mention.
//! 3. Poll the run while it is `queued`, `in_progress` or `cancelling`.
//! 4. On `completed`, read the newest message and return its first text block.
//!
//! Polling is bounded; a run that never settles yields [`RunError::TimedOut`].

use crate::backend::{AssistantApi, MessageRole, Run};
use crate::error::RunError;
use crate::prompt::PromptTemplate;
use parley_core::{AssistantId, SessionId};
use rootcause::prelude::{Report, ResultExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Polling configuration for runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Maximum number of status polls before giving up.
    pub max_poll_attempts: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 120,
        }
    }
}

/// Drives single assistant runs to completion.
#[derive(Clone)]
pub struct RunOrchestrator {
    api: Arc<dyn AssistantApi>,
    assistant_id: AssistantId,
    system_prompt: String,
    config: RunConfig,
}

impl RunOrchestrator {
    /// Creates a new orchestrator.
    #[must_use]
    pub fn new(
        api: Arc<dyn AssistantApi>,
        assistant_id: AssistantId,
        system_prompt: impl Into<String>,
        config: RunConfig,
    ) -> Self {
        Self {
            api,
            assistant_id,
            system_prompt: system_prompt.into(),
            config,
        }
    }

    /// Returns the polling configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Builds the per-run instructions for an actor mention such as `<@U1>`.
    #[must_use]
    pub fn instructions_for(&self, mention: &str) -> String {
        PromptTemplate::run_instructions()
            .render(&[("system_prompt", &self.system_prompt), ("mention", mention)])
    }

    /// Appends `user_text` to the session, runs the assistant and returns the
    /// reply text.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call fails, the run ends in a status other
    /// than `completed`, the run does not settle within the polling budget, or
    /// the newest message has no leading text block.
    #[instrument(skip(self, user_text), fields(session_id = %session_id))]
    pub async fn execute(
        &self,
        session_id: &SessionId,
        user_text: &str,
        mention: &str,
    ) -> Result<String, Report<RunError>> {
        self.api
            .append_message(session_id, MessageRole::User, user_text)
            .await
            .context(RunError::AppendMessage {
                session_id: session_id.clone(),
            })?;

        let instructions = self.instructions_for(mention);
        let run = self
            .api
            .start_run(session_id, &self.assistant_id, &instructions)
            .await
            .context(RunError::StartRun {
                session_id: session_id.clone(),
            })?;
        debug!(run_id = %run.id, "Run started");

        let run = self.await_terminal(run).await?;
        if !run.status.is_completed() {
            warn!(run_id = %run.id, status = %run.status, "Run ended without completing");
            return Err(RunError::Unsuccessful {
                run_id: run.id,
                status: run.status.to_string(),
            }
            .into());
        }

        let messages = self
            .api
            .list_messages(session_id)
            .await
            .context(RunError::FetchReply {
                session_id: session_id.clone(),
            })?;

        let reply = messages
            .first()
            .and_then(|message| message.primary_text())
            .ok_or_else(|| RunError::EmptyReply {
                session_id: session_id.clone(),
            })?;

        info!(run_id = %run.id, "Run completed");
        Ok(reply.to_string())
    }

    async fn await_terminal(&self, mut run: Run) -> Result<Run, Report<RunError>> {
        let mut attempts = 0;
        while run.status.is_pending() {
            if attempts >= self.config.max_poll_attempts {
                warn!(run_id = %run.id, attempts, "Run polling budget exhausted");
                return Err(RunError::TimedOut {
                    run_id: run.id,
                    attempts,
                }
                .into());
            }

            tokio::time::sleep(self.config.poll_interval).await;
            attempts += 1;

            run = self
                .api
                .get_run(&run.session_id, &run.id)
                .await
                .context(RunError::PollRun {
                    run_id: run.id.clone(),
                })?;
            debug!(run_id = %run.id, status = %run.status, attempts, "Polled run");
        }
        Ok(run)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory assistant.

    use crate::backend::{
        AssistantApi, AssistantSpec, ContentBlock, MessageRole, Run, RunStatus, Session,
        SessionMessage,
    };
    use crate::error::AssistantError;
    use async_trait::async_trait;
    use parley_core::{AssistantId, RunId, SessionId};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ScriptedAssistant {
        pub statuses: Mutex<VecDeque<RunStatus>>,
        pub reply: Mutex<Vec<ContentBlock>>,
        pub appended: Mutex<Vec<(SessionId, String)>>,
        pub instructions: Mutex<Vec<String>>,
        pub polls: Mutex<u32>,
        pub fail_append: bool,
    }

    impl ScriptedAssistant {
        pub fn replying(text: &str, statuses: &[RunStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().cloned().collect()),
                reply: Mutex::new(vec![ContentBlock::Text(text.to_string())]),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl AssistantApi for ScriptedAssistant {
        async fn create_session(&self) -> Result<SessionId, AssistantError> {
            Ok(SessionId::new("thread_new"))
        }

        async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, AssistantError> {
            Ok(Some(Session { id: id.clone() }))
        }

        async fn append_message(
            &self,
            session_id: &SessionId,
            _role: MessageRole,
            text: &str,
        ) -> Result<(), AssistantError> {
            if self.fail_append {
                return Err(AssistantError::ApiError {
                    operation: "create_message".to_string(),
                    status: 500,
                    body: String::new(),
                });
            }
            self.appended
                .lock()
                .unwrap()
                .push((session_id.clone(), text.to_string()));
            Ok(())
        }

        async fn start_run(
            &self,
            session_id: &SessionId,
            _assistant_id: &AssistantId,
            instructions: &str,
        ) -> Result<Run, AssistantError> {
            self.instructions
                .lock()
                .unwrap()
                .push(instructions.to_string());
            Ok(Run {
                id: RunId::new("run_1"),
                session_id: session_id.clone(),
                status: RunStatus::Queued,
            })
        }

        async fn get_run(
            &self,
            session_id: &SessionId,
            run_id: &RunId,
        ) -> Result<Run, AssistantError> {
            *self.polls.lock().unwrap() += 1;
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(RunStatus::InProgress);
            Ok(Run {
                id: run_id.clone(),
                session_id: session_id.clone(),
                status,
            })
        }

        async fn list_messages(
            &self,
            _session_id: &SessionId,
        ) -> Result<Vec<SessionMessage>, AssistantError> {
            Ok(vec![
                SessionMessage {
                    role: MessageRole::Assistant,
                    content: self.reply.lock().unwrap().clone(),
                },
                SessionMessage::text(MessageRole::Assistant, "older reply"),
            ])
        }

        async fn create_assistant(
            &self,
            _spec: &AssistantSpec,
        ) -> Result<AssistantId, AssistantError> {
            Ok(AssistantId::new("asst_test"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedAssistant;
    use super::*;
    use crate::backend::{ContentBlock, RunStatus};

    fn orchestrator(api: Arc<ScriptedAssistant>, max_poll_attempts: u32) -> RunOrchestrator {
        RunOrchestrator::new(
            api,
            AssistantId::new("asst_1"),
            "Be helpful.",
            RunConfig {
                poll_interval: Duration::from_millis(1),
                max_poll_attempts,
            },
        )
    }

    #[test]
    fn default_config() {
        let config = RunConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_poll_attempts, 120);
    }

    #[tokio::test]
    async fn completed_run_returns_newest_message() {
        let api = Arc::new(ScriptedAssistant::replying(
            "4",
            &[RunStatus::InProgress, RunStatus::Completed],
        ));
        let reply = orchestrator(api.clone(), 10)
            .execute(&SessionId::new("thread_1"), "What's 2+2?", "<@U1>")
            .await
            .expect("run");

        assert_eq!(reply, "4");
        assert_eq!(*api.polls.lock().unwrap(), 2);
        assert_eq!(
            api.appended.lock().unwrap().as_slice(),
            &[(SessionId::new("thread_1"), "What's 2+2?".to_string())]
        );
        assert_eq!(
            api.instructions.lock().unwrap().as_slice(),
            &["Be helpful.\n\nPlease address the user as <@U1>.".to_string()]
        );
    }

    #[tokio::test]
    async fn unsuccessful_run_is_an_error() {
        let api = Arc::new(ScriptedAssistant::replying("unused", &[RunStatus::Failed]));
        let err = orchestrator(api, 10)
            .execute(&SessionId::new("thread_1"), "hi", "<@U1>")
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            RunError::Unsuccessful { status, .. } if status == "failed"
        ));
    }

    #[tokio::test]
    async fn polling_is_bounded() {
        let api = Arc::new(ScriptedAssistant::replying("unused", &[]));
        let err = orchestrator(api.clone(), 3)
            .execute(&SessionId::new("thread_1"), "hi", "<@U1>")
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            RunError::TimedOut { attempts: 3, .. }
        ));
        assert_eq!(*api.polls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn non_text_reply_is_an_error() {
        let api = Arc::new(ScriptedAssistant::replying("", &[RunStatus::Completed]));
        *api.reply.lock().unwrap() = vec![ContentBlock::Other("image_file".to_string())];

        let err = orchestrator(api, 10)
            .execute(&SessionId::new("thread_1"), "draw", "<@U1>")
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), RunError::EmptyReply { .. }));
    }

    #[tokio::test]
    async fn append_failure_is_reported_with_context() {
        let api = Arc::new(ScriptedAssistant {
            fail_append: true,
            ..ScriptedAssistant::default()
        });
        let err = orchestrator(api.clone(), 10)
            .execute(&SessionId::new("thread_1"), "hi", "<@U1>")
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), RunError::AppendMessage { .. }));
        assert!(api.instructions.lock().unwrap().is_empty());
    }
}
