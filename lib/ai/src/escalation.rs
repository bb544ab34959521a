//! Web-search escalation.
//!
//! When the assistant answers with exactly [`ESCALATION_SENTINEL`], the
//! question is sent to a web search, and a single-turn completion restates
//! the findings. The restated answer is followed by the result links.

use crate::backend::CompletionApi;
use crate::error::EscalationError;
use crate::prompt::{ESCALATION_SENTINEL, NO_RESULTS_PLACEHOLDER, PromptTemplate};
use parley_integration::{SearchApi, SearchResult};
use rootcause::prelude::{Report, ResultExt};
use std::sync::Arc;
use tracing::{info, instrument};

/// Returns true if `reply` is the escalation sentinel.
///
/// Surrounding whitespace is ignored; the sentinel appearing inside a longer
/// reply does not count.
#[must_use]
pub fn is_escalation(reply: &str) -> bool {
    reply.trim() == ESCALATION_SENTINEL
}

/// Replaces sentinel replies with search-backed answers.
#[derive(Clone)]
pub struct SearchEscalator {
    search: Arc<dyn SearchApi>,
    completion: Arc<dyn CompletionApi>,
}

impl SearchEscalator {
    /// Creates a new escalator.
    #[must_use]
    pub fn new(search: Arc<dyn SearchApi>, completion: Arc<dyn CompletionApi>) -> Self {
        Self { search, completion }
    }

    /// Passes `reply` through unchanged unless it is the sentinel, in which
    /// case `question` is answered from a web search.
    ///
    /// # Errors
    ///
    /// Returns an error if escalation was needed and the search or the
    /// completion failed.
    pub async fn transform(
        &self,
        reply: String,
        question: &str,
    ) -> Result<String, Report<EscalationError>> {
        if !is_escalation(&reply) {
            return Ok(reply);
        }
        info!("Assistant requested a web search");
        self.escalate(question).await
    }

    /// Answers `question` from a web search.
    ///
    /// # Errors
    ///
    /// Returns an error if the search or the completion failed.
    #[instrument(skip(self))]
    pub async fn escalate(&self, question: &str) -> Result<String, Report<EscalationError>> {
        let results = self
            .search
            .search(question)
            .await
            .context(EscalationError::Search {
                query: question.to_string(),
            })?;
        info!(results = results.len(), "Web search returned");

        let prompt = restate_prompt(question, &results);
        let answer = self
            .completion
            .complete(&prompt)
            .await
            .context(EscalationError::Completion)?;

        Ok(format_with_sources(&answer, &results))
    }
}

fn restate_prompt(question: &str, results: &[SearchResult]) -> String {
    let snippets = if results.is_empty() {
        NO_RESULTS_PLACEHOLDER.to_string()
    } else {
        results
            .iter()
            .map(|result| result.snippet.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };

    PromptTemplate::restate_prompt().render(&[("snippets", &snippets), ("question", question)])
}

fn format_with_sources(answer: &str, results: &[SearchResult]) -> String {
    let links = results
        .iter()
        .map(|result| result.link.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{answer}\n\nSources:\n{links}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssistantError;
    use async_trait::async_trait;
    use parley_integration::SearchError;
    use std::sync::Mutex;

    struct FixedSearch {
        results: Result<Vec<SearchResult>, SearchError>,
        queries: Mutex<Vec<String>>,
    }

    impl FixedSearch {
        fn new(results: Result<Vec<SearchResult>, SearchError>) -> Arc<Self> {
            Arc::new(Self {
                results,
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchApi for FixedSearch {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            self.results.clone()
        }
    }

    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionApi for RecordingCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(AssistantError::EmptyCompletion);
            }
            Ok("About 0.92 euros per dollar.".to_string())
        }
    }

    fn hit(snippet: &str, link: &str) -> SearchResult {
        SearchResult {
            title: "title".to_string(),
            snippet: snippet.to_string(),
            link: link.to_string(),
        }
    }

    #[test]
    fn sentinel_detection_is_exact() {
        assert!(is_escalation(ESCALATION_SENTINEL));
        assert!(is_escalation(&format!("  {ESCALATION_SENTINEL}\n")));
        assert!(!is_escalation(&format!("Sure. {ESCALATION_SENTINEL}")));
        assert!(!is_escalation("4"));
    }

    #[tokio::test]
    async fn ordinary_reply_passes_through() {
        let search = FixedSearch::new(Ok(vec![]));
        let completion = Arc::new(RecordingCompletion::default());
        let escalator = SearchEscalator::new(search.clone(), completion.clone());

        let reply = escalator
            .transform("4".to_string(), "What's 2+2?")
            .await
            .expect("transform");
        assert_eq!(reply, "4");
        assert!(search.queries.lock().unwrap().is_empty());
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sentinel_reply_is_restated_with_sources() {
        let search = FixedSearch::new(Ok(vec![
            hit("1 USD = 0.92 EUR", "https://a.example"),
            hit("Rates updated hourly", "https://b.example"),
        ]));
        let completion = Arc::new(RecordingCompletion::default());
        let escalator = SearchEscalator::new(search.clone(), completion.clone());

        let reply = escalator
            .transform(
                ESCALATION_SENTINEL.to_string(),
                "what's today's exchange rate?",
            )
            .await
            .expect("transform");

        assert_eq!(
            reply,
            "About 0.92 euros per dollar.\n\nSources:\nhttps://a.example\nhttps://b.example"
        );
        assert_eq!(
            search.queries.lock().unwrap().as_slice(),
            &["what's today's exchange rate?".to_string()]
        );
        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("1 USD = 0.92 EUR\nRates updated hourly"));
        assert!(prompts[0].contains("what's today's exchange rate?"));
    }

    #[tokio::test]
    async fn empty_results_use_placeholder() {
        let completion = Arc::new(RecordingCompletion::default());
        let escalator = SearchEscalator::new(FixedSearch::new(Ok(vec![])), completion.clone());

        let reply = escalator.escalate("obscure").await.expect("escalate");
        assert_eq!(reply, "About 0.92 euros per dollar.\n\nSources:\n");
        assert!(completion.prompts.lock().unwrap()[0].contains(NO_RESULTS_PLACEHOLDER));
    }

    #[tokio::test]
    async fn search_failure_is_an_error() {
        let escalator = SearchEscalator::new(
            FixedSearch::new(Err(SearchError::ConnectionFailed {
                reason: "dns".to_string(),
            })),
            Arc::new(RecordingCompletion::default()),
        );

        let err = escalator.escalate("q").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            EscalationError::Search { query } if query == "q"
        ));
    }

    #[tokio::test]
    async fn completion_failure_is_an_error() {
        let escalator = SearchEscalator::new(
            FixedSearch::new(Ok(vec![hit("s", "https://a.example")])),
            Arc::new(RecordingCompletion {
                fail: true,
                ..RecordingCompletion::default()
            }),
        );

        let err = escalator.escalate("q").await.unwrap_err();
        assert_eq!(err.current_context(), &EscalationError::Completion);
    }
}
