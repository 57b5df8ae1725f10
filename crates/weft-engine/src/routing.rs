//! Conditional routing: pure functions from current state to the next node.

use weft_core::state::RunState;

use crate::node::{names, tags};

/// Where the executor should go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Node(&'static str),
    End,
}

/// Fixed small set of queries handled by the domain-utility branch.
pub const UTILITY_CATEGORIES: [&str; 4] = ["health", "travel", "shopping", "reverse_lookup"];

/// Keywords suggesting the query needs classification (external data or a
/// structured utility) rather than a straight cache-or-answer path.
const CLASSIFY_SIGNALS: [&str; 16] = [
    "weather", "news", "price", "stock", "current", "today", "latest", "http", "www.", "flight",
    "hotel", "near me", "schedule", "who called", "symptom", "buy",
];

/// Quick local heuristic run after prompt analysis: long prompts and
/// prompts with external-data signals earn a full classification pass;
/// short self-contained questions go straight to the cache.
pub fn wants_classification(text: &str) -> bool {
    if text.split_whitespace().count() > 25 {
        return true;
    }
    let lower = text.to_lowercase();
    CLASSIFY_SIGNALS.iter().any(|kw| lower.contains(kw))
}

fn classified_query_type(state: &RunState) -> Option<&str> {
    state
        .metadata
        .get("query_type")
        .and_then(|v| v.as_str())
        .filter(|t| UTILITY_CATEGORIES.contains(t))
}

/// Select the next node from the last path tag and relevant state fields.
///
/// Unknown tags, including node failure tags, fail open to the primary
/// response node; the executor's escalation override handles repeated
/// failures before routing is even consulted.
pub fn next_node(state: &RunState) -> Route {
    let Some(last) = state.last_path_tag() else {
        return Route::Node(names::PROMPT_ANALYZER);
    };

    match last {
        tags::PROMPT_ACCEPTABLE | tags::PROMPT_REFINED => {
            if wants_classification(state.effective_prompt()) {
                Route::Node(names::QUERY_CLASSIFIER)
            } else {
                Route::Node(names::SEMANTIC_CACHE)
            }
        }
        tags::PROMPT_ANALYZER_ERROR => Route::Node(names::MASTER_AGENT),
        tags::QUERY_CLASSIFIER => {
            if classified_query_type(state).is_some() {
                Route::Node(names::DOMAIN_UTILITY)
            } else if state.needs_web_data && !state.web_sources.is_empty() {
                Route::Node(names::WEB_RETRIEVAL)
            } else {
                Route::Node(names::SEMANTIC_CACHE)
            }
        }
        // Classifier failure defaults the branch to "no external data".
        tags::QUERY_CLASSIFIER_ERROR => Route::Node(names::SEMANTIC_CACHE),
        tags::WEB_RETRIEVAL => {
            if state.scraping_results.iter().any(|r| r.success) {
                Route::Node(names::SYNTHESIS)
            } else {
                Route::Node(names::MASTER_AGENT)
            }
        }
        tags::SYNTHESIS => {
            if state.metadata_flag("synthesis_complete") {
                Route::End
            } else {
                Route::Node(names::MASTER_AGENT)
            }
        }
        tags::CACHE_HIT => Route::End,
        tags::CACHE_MISS => Route::Node(names::MASTER_AGENT),
        tags::DOMAIN_UTILITY => Route::End,
        tags::MASTER_AGENT => {
            if state.chat_mode == weft_core::types::ChatMode::Fastest {
                Route::End
            } else {
                Route::Node(names::COST_OPTIMIZER)
            }
        }
        tags::COST_OPTIMIZER => Route::Node(names::QUALITY_ANALYST),
        tags::QUALITY_ANALYST => Route::End,
        tags::FAILURE_RECOVERY => Route::End,
        _ => Route::Node(names::MASTER_AGENT),
    }
}
