//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested sections (`SLACK__SIGNING_SECRET`,
//! `OPENAI__ASSISTANT_ID`, `PERSISTENCE__DATABASE_URL`, ...).

use parley_ai::{OpenAiConfig, RunConfig, default_system_prompt, openai};
use parley_conversation::{DEFAULT_APOLOGY, RelayConfig};
use parley_integration::{GoogleSearchConfig, SlackConfig, messaging, search};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Slack workspace credentials.
    pub slack: SlackSettings,

    /// OpenAI credentials and assistant provisioning.
    pub openai: OpenAiSettings,

    /// Google Programmable Search credentials.
    pub search: SearchSettings,

    /// Run polling and reply behaviour.
    #[serde(default)]
    pub relay: RelaySettings,

    /// Where session mappings are kept.
    #[serde(default)]
    pub persistence: PersistenceSettings,
}

/// Slack-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackSettings {
    /// Signing secret used to verify inbound requests.
    pub signing_secret: String,
    /// Bot token (`xoxb-...`) for Web API calls.
    pub bot_token: String,
    /// The bot's own user id.
    pub bot_user_id: String,
    /// Web API base URL.
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Oldest request timestamp accepted, in seconds.
    #[serde(default = "default_max_request_age_secs")]
    pub max_request_age_secs: u64,
}

/// OpenAI-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    /// API key.
    pub api_key: String,
    /// API base URL.
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
    /// Existing assistant to use. One is created at startup when unset.
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// Name given to a newly created assistant.
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    /// Model for a newly created assistant.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model for the search-restatement completion.
    #[serde(default = "default_model")]
    pub completion_model: String,
    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Search-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// Google API key.
    pub api_key: String,
    /// Programmable Search Engine id (`cx`).
    pub engine_id: String,
    /// Custom Search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
}

/// Relay behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Delay between run status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Run status polls before giving up.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Reply sent when search escalation fails.
    #[serde(default = "default_apology_message")]
    pub apology_message: String,
    /// How long shutdown waits for in-flight events, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Persistence configuration.
///
/// Postgres is used when `database_url` is set; otherwise mappings go to a
/// JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSettings {
    /// PostgreSQL connection URL.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Path of the JSON mapping file.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_slack_api_base() -> String {
    messaging::DEFAULT_SLACK_API_BASE.to_string()
}

fn default_max_request_age_secs() -> u64 {
    300
}

fn default_openai_api_base() -> String {
    openai::DEFAULT_API_BASE.to_string()
}

fn default_assistant_name() -> String {
    "ChatGPT Helper".to_string()
}

fn default_model() -> String {
    openai::DEFAULT_MODEL.to_string()
}

fn default_search_endpoint() -> String {
    search::DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    120
}

fn default_apology_message() -> String {
    DEFAULT_APOLOGY.to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("userSlackIdToThreadIdMap.json")
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            apology_message: default_apology_message(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            mapping_file: default_mapping_file(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Loads configuration from an arbitrary source.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// The system prompt shared by assistant provisioning and every run.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        self.openai
            .system_prompt
            .clone()
            .unwrap_or_else(default_system_prompt)
    }

    /// Slack Web API client settings.
    #[must_use]
    pub fn slack_client(&self) -> SlackConfig {
        SlackConfig::new(&self.slack.bot_token).with_api_base(&self.slack.api_base)
    }

    /// OpenAI client settings.
    #[must_use]
    pub fn openai_client(&self) -> OpenAiConfig {
        OpenAiConfig::new(&self.openai.api_key)
            .with_api_base(&self.openai.api_base)
            .with_completion_model(&self.openai.completion_model)
    }

    /// Search client settings.
    #[must_use]
    pub fn search_client(&self) -> GoogleSearchConfig {
        GoogleSearchConfig::new(&self.search.api_key, &self.search.engine_id)
            .with_endpoint(&self.search.endpoint)
    }

    /// Run polling settings.
    #[must_use]
    pub fn run(&self) -> RunConfig {
        RunConfig {
            poll_interval: Duration::from_millis(self.relay.poll_interval_ms),
            max_poll_attempts: self.relay.max_poll_attempts,
        }
    }

    /// Time allowed for in-flight events at shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.relay.shutdown_grace_secs)
    }

    /// Relay engine settings.
    #[must_use]
    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            bot_user_id: self.slack.bot_user_id.clone(),
            apology_message: self.relay.apology_message.clone(),
        }
    }
}
