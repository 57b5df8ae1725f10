//! Synthesis node: combines retrieved fragments with the original query
//! into one cited answer.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use weft_core::config::RetryConfig;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::AiInvoker;
use weft_core::types::{ChatMessage, InvokeParams, ModelProfile};

use crate::node::{names, tags, WorkflowNode};
use crate::retry::with_retry;

pub struct SynthesisNode {
    ai: Arc<dyn AiInvoker>,
    retry: RetryConfig,
}

impl SynthesisNode {
    pub fn new(ai: Arc<dyn AiInvoker>, retry: RetryConfig) -> Self {
        Self { ai, retry }
    }
}

impl WorkflowNode for SynthesisNode {
    fn name(&self) -> &'static str {
        names::SYNTHESIS
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let fragments: Vec<_> = state
                .scraping_results
                .iter()
                .filter(|r| r.success)
                .collect();

            // Routing only sends us here with at least one success, but a
            // plain pass-through keeps the node safe to call regardless.
            if fragments.is_empty() {
                return Ok(StateUpdate::from_node(self.name(), tags::SYNTHESIS));
            }

            let mut excerpts = String::new();
            let mut citations = String::new();
            for (i, frag) in fragments.iter().enumerate() {
                let title = frag.title.as_deref().unwrap_or(&frag.source);
                let body = frag.extracted_text.as_deref().unwrap_or("");
                excerpts.push_str(&format!("[{}] {}\n{}\n\n", i + 1, title, body));
                citations.push_str(&format!("[{}] {} ({})\n", i + 1, title, frag.source));
            }

            let prompt = format!(
                "Answer the question concisely using only the source excerpts below. \
                 Cite sources inline as [1], [2], etc.\n\nQuestion: {}\n\nSources:\n{}",
                state.effective_prompt(),
                excerpts
            );

            let completion = with_retry("synthesis", &self.retry, || {
                self.ai
                    .invoke(&prompt, ModelProfile::Primary, InvokeParams::default())
            })
            .await?;

            debug!(sources = fragments.len(), "synthesis complete");
            let answer = format!("{}\n\nSources:\n{}", completion.text.trim(), citations);
            Ok(StateUpdate::from_node(self.name(), tags::SYNTHESIS)
                .with_message(ChatMessage::agent(answer))
                .with_meta("synthesis_complete", json!(true))
                .with_meta("synthesis_sources", json!(fragments.len())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::types::{ChatMode, RetrievalOutcome};
    use weft_test_utils::MockAiInvoker;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            call_timeout_ms: 1000,
        }
    }

    fn state_with_results(results: Vec<RetrievalOutcome>) -> RunState {
        let mut s = RunState::new("c1", "u1", "latest news", ChatMode::Balanced, 0.10, vec![]);
        s.apply(StateUpdate {
            scraping_results: results,
            ..Default::default()
        });
        s
    }

    fn ok_result(source: &str, title: &str, text: &str) -> RetrievalOutcome {
        RetrievalOutcome {
            source: source.into(),
            success: true,
            title: Some(title.into()),
            extracted_text: Some(text.into()),
        }
    }

    #[tokio::test]
    async fn test_synthesizes_and_cites_sources() {
        let ai = Arc::new(MockAiInvoker::new("Summary of the news [1]."));
        let node = SynthesisNode::new(ai.clone(), fast_retry());
        let s = state_with_results(vec![
            ok_result("https://a.example", "Site A", "alpha body"),
            RetrievalOutcome {
                source: "https://b.example".into(),
                success: false,
                title: None,
                extracted_text: None,
            },
        ]);

        let update = node.run(&s).await.unwrap();
        assert_eq!(update.agent_path, vec![tags::SYNTHESIS]);
        assert_eq!(update.metadata["synthesis_complete"], json!(true));
        let answer = &update.messages[0].content;
        assert!(answer.contains("Summary of the news"));
        assert!(answer.contains("[1] Site A (https://a.example)"));

        // Only successful fragments reach the prompt.
        let (prompt, profile) = &ai.calls()[0];
        assert!(prompt.contains("alpha body"));
        assert!(!prompt.contains("b.example"));
        assert_eq!(*profile, ModelProfile::Primary);
    }

    #[tokio::test]
    async fn test_no_fragments_is_a_passthrough() {
        let ai = Arc::new(MockAiInvoker::new("unused"));
        let node = SynthesisNode::new(ai.clone(), fast_retry());
        let s = state_with_results(vec![]);

        let update = node.run(&s).await.unwrap();
        assert!(update.messages.is_empty());
        assert!(!update.metadata.contains_key("synthesis_complete"));
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ai_failure_propagates() {
        let ai = Arc::new(MockAiInvoker::new("never"));
        ai.fail_next(10);
        let node = SynthesisNode::new(ai, fast_retry());
        let s = state_with_results(vec![ok_result("https://a.example", "A", "body")]);

        assert!(node.run(&s).await.is_err());
    }
}
