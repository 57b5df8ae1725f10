use futures::future::BoxFuture;

use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};

/// One pipeline step: a function from run-state to a partial update.
///
/// Nodes never mutate state directly; the executor folds the returned
/// `StateUpdate` through the merge engine. A node that defines degraded
/// behavior for its own failures (classifier, cache lookup, retrieval)
/// handles them internally and returns `Ok`; an `Err` reaching the
/// executor is converted into the uniform failure update (one
/// `failure_count` increment plus a `{name}_error` path tag).
pub trait WorkflowNode: Send + Sync {
    /// Registry key for this node, also used to build error path tags.
    fn name(&self) -> &'static str;

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>>;
}

/// Node registry keys.
pub mod names {
    pub const PROMPT_ANALYZER: &str = "prompt_analyzer";
    pub const SEMANTIC_CACHE: &str = "semantic_cache";
    pub const QUERY_CLASSIFIER: &str = "query_classifier";
    pub const DOMAIN_UTILITY: &str = "domain_utility";
    pub const WEB_RETRIEVAL: &str = "web_retrieval";
    pub const SYNTHESIS: &str = "synthesis";
    pub const MASTER_AGENT: &str = "master_agent";
    pub const COST_OPTIMIZER: &str = "cost_optimizer";
    pub const QUALITY_ANALYST: &str = "quality_analyst";
    pub const FAILURE_RECOVERY: &str = "failure_recovery";
}

/// Path tags appended to `agent_path`, the authoritative execution trace.
pub mod tags {
    pub const PROMPT_ACCEPTABLE: &str = "prompt_acceptable";
    pub const PROMPT_REFINED: &str = "prompt_refined";
    pub const PROMPT_ANALYZER_ERROR: &str = "prompt_analyzer_error";
    pub const QUERY_CLASSIFIER: &str = "query_classifier";
    pub const QUERY_CLASSIFIER_ERROR: &str = "query_classifier_error";
    pub const DOMAIN_UTILITY: &str = "domain_utility";
    pub const WEB_RETRIEVAL: &str = "web_retrieval";
    pub const SYNTHESIS: &str = "synthesis";
    pub const CACHE_HIT: &str = "cache_hit";
    pub const CACHE_MISS: &str = "cache_miss";
    pub const MASTER_AGENT: &str = "master_agent";
    pub const COST_OPTIMIZER: &str = "cost_optimizer";
    pub const QUALITY_ANALYST: &str = "quality_analyst";
    pub const FAILURE_RECOVERY: &str = "failure_recovery";
    pub const ERROR_FALLBACK: &str = "error_fallback";
}
