//! Semantic cache lookup node: a shortcut that ends the run on a hit.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{info, warn};

use weft_cache::SemanticCache;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::types::ChatMessage;

use crate::node::{names, tags, WorkflowNode};

pub struct CacheLookupNode {
    cache: Arc<SemanticCache>,
}

impl CacheLookupNode {
    pub fn new(cache: Arc<SemanticCache>) -> Self {
        Self { cache }
    }
}

impl WorkflowNode for CacheLookupNode {
    fn name(&self) -> &'static str {
        names::SEMANTIC_CACHE
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            match self.cache.lookup(state.effective_prompt()) {
                Ok(Some(hit)) => {
                    info!(similarity = hit.similarity, "answering from semantic cache");
                    let mut update = StateUpdate::from_node(self.name(), tags::CACHE_HIT)
                        .with_message(ChatMessage::agent(hit.response))
                        .with_optimization("semantic_cache")
                        .with_meta("cache_similarity", json!(hit.similarity));
                    update.cache_hit = Some(true);
                    Ok(update)
                }
                Ok(None) => Ok(StateUpdate::from_node(self.name(), tags::CACHE_MISS)),
                // Cache trouble is never fatal; treat it as a miss.
                Err(e) => {
                    warn!(error = %e, "cache lookup failed, treating as miss");
                    Ok(StateUpdate::from_node(self.name(), tags::CACHE_MISS)
                        .with_meta("cache_error", json!(e.to_string())))
                }
            }
        })
    }
}
