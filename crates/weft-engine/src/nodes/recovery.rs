//! Failure recovery node: the terminal step forced by the executor once a
//! run accumulates too many failures.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{info, warn};

use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::AiInvoker;
use weft_core::types::{ChatMessage, InvokeParams, ModelProfile, RiskLevel};

use crate::node::{names, tags, WorkflowNode};

const MAX_BACKOFF_MS: u64 = 30_000;

const APOLOGY_PREAMBLE: &str = "I ran into repeated problems while working on this request. \
Here is my best attempt at an answer:";

/// Canned response when even the recovery model is unreachable.
const CANNED_APOLOGY: &str = "I'm sorry - I ran into repeated problems while working on this \
request and can't produce a full answer right now. Please try again in a moment.";

/// Backoff before the recovery attempt, scaled by how broken the run is.
fn backoff_ms(failure_count: u32) -> u64 {
    1000u64
        .saturating_mul(1u64 << failure_count.min(14))
        .min(MAX_BACKOFF_MS)
}

pub struct FailureRecoveryNode {
    ai: Arc<dyn AiInvoker>,
}

impl FailureRecoveryNode {
    pub fn new(ai: Arc<dyn AiInvoker>) -> Self {
        Self { ai }
    }
}

impl WorkflowNode for FailureRecoveryNode {
    fn name(&self) -> &'static str {
        names::FAILURE_RECOVERY
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let wait = backoff_ms(state.failure_count);
            info!(
                failure_count = state.failure_count,
                backoff_ms = wait,
                "entering failure recovery"
            );
            tokio::time::sleep(Duration::from_millis(wait)).await;

            let prompt = format!("{}\n\n{}", APOLOGY_PREAMBLE, state.effective_prompt());
            let text = match self
                .ai
                .invoke(&prompt, ModelProfile::Economical, InvokeParams::default())
                .await
            {
                Ok(completion) => format!("{}\n\n{}", APOLOGY_PREAMBLE, completion.text.trim()),
                Err(e) => {
                    warn!(error = %e, "recovery model also failed, using canned apology");
                    CANNED_APOLOGY.to_string()
                }
            };

            let mut update = StateUpdate::from_node(self.name(), tags::FAILURE_RECOVERY)
                .with_message(ChatMessage::agent(text))
                .with_risk(RiskLevel::High)
                .with_meta("recovered", json!(true));
            update.cache_hit = Some(false);
            Ok(update)
        })
    }
}
