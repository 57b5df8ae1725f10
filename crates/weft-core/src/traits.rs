use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// AI invocation: the opaque model backend used by answer-producing nodes.
pub trait AiInvoker: Send + Sync + 'static {
    /// Run one completion against the given model profile.
    fn invoke(
        &self,
        prompt: &str,
        profile: ModelProfile,
        params: InvokeParams,
    ) -> BoxFuture<'_, Result<Completion>>;
}

/// Query classification: decides whether a query needs external data and
/// which sources to consult.
pub trait QueryClassifier: Send + Sync + 'static {
    fn classify(&self, raw_text: &str) -> BoxFuture<'_, Result<Classification>>;
}

/// External page retrieval with per-call timeout.
pub trait RetrievalTool: Send + Sync + 'static {
    fn fetch(
        &self,
        source_url: &str,
        extraction_template: &str,
        timeout_ms: u64,
    ) -> BoxFuture<'_, Result<RetrievedPage>>;
}

/// Structured domain utilities (health/travel/shopping/reverse-lookup).
pub trait DomainUtilityTool: Send + Sync + 'static {
    fn perform(
        &self,
        operation: &str,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<String>>;
}
