//! Entry node: estimates prompt cost and refines over-budget or overly
//! complex prompts before anything expensive runs.

use futures::future::BoxFuture;
use tracing::debug;

use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};

use crate::node::{names, tags, WorkflowNode};

const TOKENS_PER_WORD: f64 = 1.3;
const HIGH_COMPLEXITY_WORDS: usize = 500;
const MAX_REFINED_CHARS: usize = 2000;

/// Politeness and filler words stripped during refinement.
const FILLER_WORDS: [&str; 12] = [
    "please", "kindly", "basically", "actually", "really", "very", "just", "simply", "literally",
    "honestly", "perhaps", "maybe",
];

pub struct PromptAnalyzer {
    token_rate: f64,
}

impl PromptAnalyzer {
    pub fn new(token_rate: f64) -> Self {
        Self { token_rate }
    }

    /// Token-count heuristic: ~1.3 tokens per word at a flat per-token rate.
    pub fn estimate_cost(&self, text: &str) -> f64 {
        text.split_whitespace().count() as f64 * TOKENS_PER_WORD * self.token_rate
    }
}

/// Heuristic complexity check: very long prompts, code fences, or a pile
/// of questions all warrant refinement.
fn is_high_complexity(text: &str) -> bool {
    text.split_whitespace().count() > HIGH_COMPLEXITY_WORDS
        || text.contains("```")
        || text.matches('?').count() > 2
}

/// Rewrite a prompt: collapse whitespace, drop filler words, cap length.
/// Only removes content, so the refined estimate never exceeds the
/// original.
fn refine(text: &str) -> String {
    let mut refined = text
        .split_whitespace()
        .filter(|w| {
            let bare = w
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            !FILLER_WORDS.contains(&bare.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ");

    if refined.len() > MAX_REFINED_CHARS {
        let mut cut = MAX_REFINED_CHARS;
        while !refined.is_char_boundary(cut) {
            cut -= 1;
        }
        refined.truncate(cut);
    }
    refined
}

impl WorkflowNode for PromptAnalyzer {
    fn name(&self) -> &'static str {
        names::PROMPT_ANALYZER
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let prompt = state.user_message();
            let cost = self.estimate_cost(prompt);

            if cost > state.cost_budget || is_high_complexity(prompt) {
                let refined = refine(prompt);
                let refined_cost = self.estimate_cost(&refined);
                debug!(
                    original_cost = cost,
                    refined_cost,
                    budget = state.cost_budget,
                    "prompt refined"
                );
                let mut update = StateUpdate::from_node(self.name(), tags::PROMPT_REFINED)
                    .with_optimization("prompt_refinement");
                update.refined_prompt = Some(refined);
                update.prompt_cost = Some(refined_cost);
                Ok(update)
            } else {
                debug!(cost, budget = state.cost_budget, "prompt acceptable");
                let mut update = StateUpdate::from_node(self.name(), tags::PROMPT_ACCEPTABLE);
                update.prompt_cost = Some(cost);
                Ok(update)
            }
        })
    }
}
