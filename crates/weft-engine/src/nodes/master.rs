//! Primary response node: the default answer producer.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use weft_cache::SemanticCache;
use weft_core::config::RetryConfig;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::AiInvoker;
use weft_core::types::{ChatMessage, ChatMode, InvokeParams, ModelProfile, Role};

use crate::node::{names, tags, WorkflowNode};
use crate::retry::with_retry;

/// How many trailing conversation messages are carried into the prompt.
const HISTORY_WINDOW: usize = 6;

/// Canned answer used when upstream retrieval failed entirely.
const FALLBACK_ANSWER: &str = "I couldn't reach the external sources this question needs, so I \
can't give a fully up-to-date answer right now. Please try again shortly, or rephrase the \
question so it doesn't depend on live data.";

fn strategy_prefix(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Fastest => "Answer in one or two sentences with no preamble.",
        ChatMode::Cheapest => "Answer as briefly as accuracy allows.",
        ChatMode::Balanced => "Answer helpfully, accurately, and concisely.",
    }
}

pub struct MasterNode {
    ai: Arc<dyn AiInvoker>,
    cache: Arc<SemanticCache>,
    retry: RetryConfig,
}

impl MasterNode {
    pub fn new(ai: Arc<dyn AiInvoker>, cache: Arc<SemanticCache>, retry: RetryConfig) -> Self {
        Self { ai, cache, retry }
    }

    fn build_prompt(&self, state: &RunState) -> String {
        let mut prompt = String::from(strategy_prefix(state.chat_mode));
        prompt.push_str("\n\n");

        let history: Vec<_> = state
            .messages
            .iter()
            .rev()
            .skip(1) // the newest user message goes last, below
            .take(HISTORY_WINDOW)
            .collect();
        if !history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for msg in history.into_iter().rev() {
                let who = match msg.role {
                    Role::User => "User",
                    Role::Agent => "Assistant",
                };
                prompt.push_str(&format!("{}: {}\n", who, msg.content));
            }
            prompt.push('\n');
        }

        prompt.push_str(state.effective_prompt());
        prompt
    }
}

impl WorkflowNode for MasterNode {
    fn name(&self) -> &'static str {
        names::MASTER_AGENT
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            // Upstream retrieval failed outright: explain instead of
            // answering from stale air.
            if state.metadata_flag("fallback") {
                debug!("retrieval fallback active, substituting canned answer");
                return Ok(StateUpdate::from_node(self.name(), tags::MASTER_AGENT)
                    .with_message(ChatMessage::agent(FALLBACK_ANSWER))
                    .with_meta("degraded", json!(true)));
            }

            let prompt = self.build_prompt(state);
            let completion = with_retry("master", &self.retry, || {
                self.ai
                    .invoke(&prompt, ModelProfile::Primary, InvokeParams::default())
            })
            .await?;

            // A successful primary answer seeds the semantic cache for
            // future near-duplicate prompts.
            if let Err(e) = self.cache.store(state.effective_prompt(), &completion.text) {
                warn!(error = %e, "cache store failed after primary response");
            }

            Ok(StateUpdate::from_node(self.name(), tags::MASTER_AGENT)
                .with_message(ChatMessage::agent(completion.text))
                .with_meta("output_tokens", json!(completion.output_tokens)))
        })
    }
}
