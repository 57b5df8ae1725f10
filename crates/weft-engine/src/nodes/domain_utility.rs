//! Domain utility node: structured operations for a fixed set of utility
//! query categories (health, travel, shopping, reverse lookup).

use std::sync::Arc;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use weft_core::config::RetryConfig;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::DomainUtilityTool;
use weft_core::types::ChatMessage;

use crate::node::{names, tags, WorkflowNode};
use crate::retry::with_retry;

pub struct DomainUtilityNode {
    tool: Arc<dyn DomainUtilityTool>,
    retry: RetryConfig,
    phone_re: Regex,
    place_re: Regex,
    item_re: Regex,
}

impl DomainUtilityNode {
    pub fn new(tool: Arc<dyn DomainUtilityTool>, retry: RetryConfig) -> Self {
        Self {
            tool,
            retry,
            // Loose on purpose: separators vary wildly in user input.
            phone_re: Regex::new(r"\+?\d[\d\s().-]{6,}\d").expect("static regex"),
            place_re: Regex::new(r"(?i)\b(?:in|to|near|from)\s+([a-z][a-z\s]{2,30}?)(?:[.,?!]|$)")
                .expect("static regex"),
            item_re: Regex::new(r"(?i)\b(?:buy|price of|cost of|find)\s+(.{2,60}?)(?:[.,?!]|$)")
                .expect("static regex"),
        }
    }

    /// Regex/keyword entity extraction from the raw query text.
    fn extract_entities(&self, text: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut entities = serde_json::Map::new();
        if let Some(m) = self.phone_re.find(text) {
            entities.insert("phone_number".into(), json!(m.as_str().trim()));
        }
        if let Some(c) = self.place_re.captures(text) {
            entities.insert("place".into(), json!(c[1].trim()));
        }
        if let Some(c) = self.item_re.captures(text) {
            entities.insert("item".into(), json!(c[1].trim()));
        }
        entities
    }
}

impl WorkflowNode for DomainUtilityNode {
    fn name(&self) -> &'static str {
        names::DOMAIN_UTILITY
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let operation = state
                .metadata
                .get("query_type")
                .and_then(|v| v.as_str())
                .unwrap_or("general")
                .to_string();
            let query = state.effective_prompt();

            let payload = json!({
                "query": query,
                "entities": self.extract_entities(query),
            });
            debug!(operation = %operation, "dispatching domain utility request");

            let result = with_retry("domain_utility", &self.retry, || {
                self.tool.perform(&operation, payload.clone())
            })
            .await?;

            Ok(StateUpdate::from_node(self.name(), tags::DOMAIN_UTILITY)
                .with_message(ChatMessage::agent(result))
                .with_meta("utility_operation", json!(operation)))
        })
    }
}
