use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // External capability errors
    #[error("AI invocation failed: {0}")]
    Invocation(String),

    #[error("AI invocation timed out after {timeout_ms}ms")]
    InvocationTimeout { timeout_ms: u64 },

    #[error("Query classification failed: {0}")]
    Classification(String),

    // Field is named `url` because thiserror reserves `source` for a
    // wrapped error cause.
    #[error("Retrieval failed for {url}: {message}")]
    Retrieval { url: String, message: String },

    #[error("Domain utility '{operation}' failed: {message}")]
    Utility { operation: String, message: String },

    // Cache errors
    #[error("Semantic cache error: {0}")]
    Cache(String),

    // Run errors
    #[error("Run exceeded max steps ({0})")]
    MaxStepsExceeded(usize),

    #[error("Run exceeded wall-clock budget ({0}ms)")]
    RunBudgetExceeded(u64),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeftError {
    /// Whether this error is worth retrying at the call site.
    ///
    /// Only transient external-call failures qualify; structural errors
    /// (bad config, unknown node, exhausted budgets) never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WeftError::Invocation(_)
                | WeftError::InvocationTimeout { .. }
                | WeftError::Retrieval { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WeftError>;
