//! Prompt templates.
//!
//! The relay uses three prompts: the shared system prompt (which carries the
//! escalation-sentinel contract), the per-run instructions that add the
//! actor's mention, and the follow-up prompt that asks the model to restate
//! web-search findings. Templates use `{{variable}}` placeholders.

use std::collections::HashMap;

/// The exact reply the assistant is told to give when it cannot answer from
/// its own knowledge. Matched against the trimmed reply, never as a substring.
pub const ESCALATION_SENTINEL: &str = "I_NEED_TO_SEARCH_THE_WEB";

/// Placeholder used in the restate prompt when a search returns nothing.
pub const NO_RESULTS_PLACEHOLDER: &str = "No search results found.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant chatting with people in Slack. \
Answer concisely. If answering requires current events, live data, or anything \
you are not confident you know, reply with exactly {{sentinel}} and nothing else.";

const RUN_INSTRUCTIONS: &str = "{{system_prompt}}\n\nPlease address the user as {{mention}}.";

const RESTATE_PROMPT: &str = "Here are web search results relevant to a question.\n\n\
Search results:\n{{snippets}}\n\n\
Question: {{question}}\n\n\
Answer the question by restating these findings in your own words. \
Present the answer as your own knowledge; do not mention searching or search results.";

/// Definition of a template variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Default value if not provided.
    pub default: Option<String>,
}

impl VariableDefinition {
    /// A variable the caller must supply.
    #[must_use]
    pub fn required() -> Self {
        Self::default()
    }

    /// A variable that falls back to `default` when not supplied.
    #[must_use]
    pub fn optional(default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
        }
    }
}

/// A prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Template name (used in logs).
    pub name: String,
    /// Template content with placeholders.
    pub content: String,
    /// Variable definitions (name -> definition).
    pub variables: HashMap<String, VariableDefinition>,
}

impl PromptTemplate {
    /// Creates a new prompt template.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            variables: HashMap::new(),
        }
    }

    /// Adds a variable definition.
    #[must_use]
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        definition: VariableDefinition,
    ) -> Self {
        self.variables.insert(name.into(), definition);
        self
    }

    /// The shared system prompt, with the sentinel contract filled in.
    #[must_use]
    pub fn system_prompt() -> Self {
        Self::new("system_prompt", SYSTEM_PROMPT)
            .with_variable("sentinel", VariableDefinition::optional(ESCALATION_SENTINEL))
    }

    /// Per-run instructions: system prompt plus the actor's mention.
    #[must_use]
    pub fn run_instructions() -> Self {
        Self::new("run_instructions", RUN_INSTRUCTIONS)
            .with_variable("system_prompt", VariableDefinition::required())
            .with_variable("mention", VariableDefinition::required())
    }

    /// Follow-up prompt restating web-search findings.
    #[must_use]
    pub fn restate_prompt() -> Self {
        Self::new("restate_prompt", RESTATE_PROMPT)
            .with_variable("snippets", VariableDefinition::optional(NO_RESULTS_PLACEHOLDER))
            .with_variable("question", VariableDefinition::required())
    }

    /// Renders the template with the given variables.
    ///
    /// Variables are substituted using `{{variable_name}}` syntax; defaults
    /// fill any declared variable left unset.
    #[must_use]
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        let mut result = self.content.clone();

        for (name, value) in variables {
            let placeholder = format!("{{{{{name}}}}}");
            result = result.replace(&placeholder, value);
        }

        for (name, def) in &self.variables {
            let placeholder = format!("{{{{{name}}}}}");
            if let Some(default) = &def.default
                && result.contains(&placeholder)
            {
                result = result.replace(&placeholder, default);
            }
        }

        result
    }
}

/// Renders the default shared system prompt.
#[must_use]
pub fn default_system_prompt() -> String {
    PromptTemplate::system_prompt().render(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_embeds_sentinel() {
        let prompt = default_system_prompt();
        assert!(prompt.contains(ESCALATION_SENTINEL));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn run_instructions_include_mention_and_system_prompt() {
        let rendered = PromptTemplate::run_instructions()
            .render(&[("system_prompt", "Be nice."), ("mention", "<@U1>")]);
        assert_eq!(rendered, "Be nice.\n\nPlease address the user as <@U1>.");
    }

    #[test]
    fn restate_prompt_falls_back_to_placeholder() {
        let rendered = PromptTemplate::restate_prompt().render(&[("question", "rate?")]);
        assert!(rendered.contains(NO_RESULTS_PLACEHOLDER));
        assert!(rendered.contains("Question: rate?"));
    }
}
