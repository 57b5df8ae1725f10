//! Query classification node: asks the external classifier whether the
//! query needs external data, and which sources to consult.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use weft_core::config::RetryConfig;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::QueryClassifier;

use crate::node::{names, tags, WorkflowNode};
use crate::retry::with_retry;

pub struct QueryClassifierNode {
    classifier: Arc<dyn QueryClassifier>,
    retry: RetryConfig,
}

impl QueryClassifierNode {
    pub fn new(classifier: Arc<dyn QueryClassifier>, retry: RetryConfig) -> Self {
        Self { classifier, retry }
    }
}

impl WorkflowNode for QueryClassifierNode {
    fn name(&self) -> &'static str {
        names::QUERY_CLASSIFIER
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let raw = state.effective_prompt();
            let result = with_retry("classify", &self.retry, || self.classifier.classify(raw)).await;

            match result {
                Ok(c) => {
                    debug!(
                        query_type = %c.query_type,
                        needs_external_data = c.needs_external_data,
                        confidence = c.confidence,
                        "query classified"
                    );
                    let mut update = StateUpdate::from_node(self.name(), tags::QUERY_CLASSIFIER)
                        .with_meta("query_type", json!(c.query_type))
                        .with_meta("classification_confidence", json!(c.confidence));
                    if let Some(strategy) = c.extraction_strategy {
                        update = update.with_meta("extraction_strategy", json!(strategy));
                    }
                    update.needs_web_data = Some(c.needs_external_data);
                    update.web_sources = c.suggested_sources;
                    Ok(update)
                }
                // Classification failure is non-fatal: default the branch
                // to "no external data needed" and record the error tag.
                Err(e) => {
                    warn!(error = %e, "classification failed, defaulting branch");
                    let mut update =
                        StateUpdate::from_node(self.name(), tags::QUERY_CLASSIFIER_ERROR)
                            .with_meta("classification_error", json!(e.to_string()));
                    update.needs_web_data = Some(false);
                    Ok(update)
                }
            }
        })
    }
}
