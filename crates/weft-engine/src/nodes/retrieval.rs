//! External retrieval node: fetches up to three suggested sources,
//! tolerating partial failures.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::RetrievalTool;
use weft_core::types::RetrievalOutcome;

use crate::node::{names, tags, WorkflowNode};

/// Cap on sources attempted per run.
pub const MAX_SOURCES: usize = 3;

const DEFAULT_TEMPLATE: &str = "article";

pub struct RetrievalNode {
    tool: Arc<dyn RetrievalTool>,
    timeout_ms: u64,
}

impl RetrievalNode {
    pub fn new(tool: Arc<dyn RetrievalTool>, timeout_ms: u64) -> Self {
        Self { tool, timeout_ms }
    }
}

impl WorkflowNode for RetrievalNode {
    fn name(&self) -> &'static str {
        names::WEB_RETRIEVAL
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let template = state
                .metadata
                .get("extraction_strategy")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_TEMPLATE);

            let mut outcomes = Vec::new();
            for source in state.web_sources.iter().take(MAX_SOURCES) {
                let fetched = tokio::time::timeout(
                    Duration::from_millis(self.timeout_ms),
                    self.tool.fetch(source, template, self.timeout_ms),
                )
                .await;

                let failed = || RetrievalOutcome {
                    source: source.clone(),
                    success: false,
                    title: None,
                    extracted_text: None,
                };
                let outcome = match fetched {
                    Ok(Ok(page)) if page.success => {
                        debug!(source = %source, "source retrieved");
                        RetrievalOutcome {
                            source: source.clone(),
                            success: true,
                            title: page.title,
                            extracted_text: page.extracted_text,
                        }
                    }
                    Ok(Ok(_)) => {
                        warn!(source = %source, "source reported extraction failure");
                        failed()
                    }
                    Ok(Err(e)) => {
                        warn!(source = %source, error = %e, "source failed");
                        failed()
                    }
                    Err(_) => {
                        warn!(source = %source, timeout_ms = self.timeout_ms, "source timed out");
                        failed()
                    }
                };
                outcomes.push(outcome);
            }

            let any_success = outcomes.iter().any(|o| o.success);
            let mut update = StateUpdate::from_node(self.name(), tags::WEB_RETRIEVAL);
            update.scraping_results = outcomes;
            if !any_success {
                // Downstream substitutes a canned answer instead of raising.
                update = update.with_meta("fallback", json!(true));
            }
            Ok(update)
        })
    }
}
