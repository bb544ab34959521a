//! Assistant provisioning at startup.

use crate::config::OpenAiSettings;
use crate::error::StartupError;
use parley_ai::{AssistantApi, AssistantSpec};
use parley_core::AssistantId;
use rootcause::prelude::{Report, ResultExt};
use tracing::info;

/// Returns the configured assistant, creating one when none is configured.
///
/// # Errors
///
/// Returns an error if an assistant had to be created and creation failed.
pub async fn resolve_assistant(
    api: &dyn AssistantApi,
    settings: &OpenAiSettings,
    system_prompt: &str,
) -> Result<AssistantId, Report<StartupError>> {
    if let Some(id) = settings
        .assistant_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        info!(assistant_id = %id, "Using configured assistant");
        return Ok(AssistantId::new(id));
    }

    let spec = AssistantSpec {
        name: settings.assistant_name.clone(),
        model: settings.model.clone(),
        instructions: system_prompt.to_string(),
    };
    let assistant_id = api
        .create_assistant(&spec)
        .await
        .context(StartupError::Provision {
            name: spec.name.clone(),
            model: spec.model.clone(),
        })?;

    info!(
        assistant_id = %assistant_id,
        name = %spec.name,
        "Created assistant; set OPENAI__ASSISTANT_ID to reuse it"
    );
    Ok(assistant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_ai::{AssistantError, MessageRole, Run, Session, SessionMessage};
    use parley_core::{RunId, SessionId};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Provisioner {
        specs: Mutex<Vec<AssistantSpec>>,
        fail: bool,
    }

    #[async_trait]
    impl AssistantApi for Provisioner {
        async fn create_session(&self) -> Result<SessionId, AssistantError> {
            unreachable!("not used by provisioning")
        }

        async fn get_session(&self, _id: &SessionId) -> Result<Option<Session>, AssistantError> {
            unreachable!("not used by provisioning")
        }

        async fn append_message(
            &self,
            _session_id: &SessionId,
            _role: MessageRole,
            _text: &str,
        ) -> Result<(), AssistantError> {
            unreachable!("not used by provisioning")
        }

        async fn start_run(
            &self,
            _session_id: &SessionId,
            _assistant_id: &AssistantId,
            _instructions: &str,
        ) -> Result<Run, AssistantError> {
            unreachable!("not used by provisioning")
        }

        async fn get_run(
            &self,
            _session_id: &SessionId,
            _run_id: &RunId,
        ) -> Result<Run, AssistantError> {
            unreachable!("not used by provisioning")
        }

        async fn list_messages(
            &self,
            _session_id: &SessionId,
        ) -> Result<Vec<SessionMessage>, AssistantError> {
            unreachable!("not used by provisioning")
        }

        async fn create_assistant(
            &self,
            spec: &AssistantSpec,
        ) -> Result<AssistantId, AssistantError> {
            if self.fail {
                return Err(AssistantError::ApiError {
                    operation: "create_assistant".to_string(),
                    status: 401,
                    body: "invalid api key".to_string(),
                });
            }
            self.specs.lock().unwrap().push(spec.clone());
            Ok(AssistantId::new("asst_new"))
        }
    }

    fn settings(assistant_id: Option<&str>) -> OpenAiSettings {
        OpenAiSettings {
            api_key: "sk-1".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            assistant_id: assistant_id.map(str::to_string),
            assistant_name: "ChatGPT Helper".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            completion_model: "gpt-3.5-turbo".to_string(),
            system_prompt: None,
        }
    }

    #[tokio::test]
    async fn configured_assistant_is_used_as_is() {
        let api = Provisioner::default();

        let id = resolve_assistant(&api, &settings(Some("asst_existing")), "prompt")
            .await
            .expect("resolve");

        assert_eq!(id.as_str(), "asst_existing");
        assert!(api.specs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn creates_assistant_when_unconfigured() {
        let api = Provisioner::default();

        let id = resolve_assistant(&api, &settings(Some("  ")), "Be helpful.")
            .await
            .expect("resolve");

        assert_eq!(id.as_str(), "asst_new");
        assert_eq!(
            api.specs.lock().unwrap().as_slice(),
            &[AssistantSpec {
                name: "ChatGPT Helper".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                instructions: "Be helpful.".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn creation_failure_is_reported() {
        let api = Provisioner {
            fail: true,
            ..Provisioner::default()
        };

        let err = resolve_assistant(&api, &settings(None), "prompt")
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            StartupError::Provision { .. }
        ));
    }
}
