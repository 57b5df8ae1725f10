use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// Top-level engine configuration.
///
/// Every field has a serde default so a partial TOML file (or none at all)
/// yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default per-run ceiling on estimated prompt cost.
    #[serde(default = "default_cost_budget")]
    pub default_cost_budget: f64,

    /// Hard bound on workflow steps per run; exceeding it is fatal.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Hard wall-clock budget per run in milliseconds.
    #[serde(default = "default_wall_clock_budget_ms")]
    pub wall_clock_budget_ms: u64,

    /// Estimated cost per prompt token.
    #[serde(default = "default_token_rate")]
    pub token_rate: f64,

    /// Per-source retrieval timeout in milliseconds.
    #[serde(default = "default_retrieval_timeout_ms")]
    pub retrieval_timeout_ms: u64,

    /// Rolling cost ledger capacity.
    #[serde(default = "default_ledger_capacity")]
    pub ledger_capacity: usize,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_cost_budget() -> f64 {
    0.10
}
fn default_max_steps() -> usize {
    20
}
fn default_wall_clock_budget_ms() -> u64 {
    120_000
}
fn default_token_rate() -> f64 {
    0.000_05
}
fn default_retrieval_timeout_ms() -> u64 {
    10_000
}
fn default_ledger_capacity() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_cost_budget: default_cost_budget(),
            max_steps: default_max_steps(),
            wall_clock_budget_ms: default_wall_clock_budget_ms(),
            token_rate: default_token_rate(),
            retrieval_timeout_ms: default_retrieval_timeout_ms(),
            ledger_capacity: default_ledger_capacity(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| WeftError::Config(e.to_string()))
    }
}

/// Semantic cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached responses.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Cosine similarity above which a lookup counts as a hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_cache_capacity() -> usize {
    100
}
fn default_similarity_threshold() -> f32 {
    0.85
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Retry policy for external capability calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Timeout applied to each individual attempt.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8000
}
fn default_call_timeout() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            call_timeout_ms: default_call_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert!((cfg.default_cost_budget - 0.10).abs() < 1e-9);
        assert_eq!(cfg.max_steps, 20);
        assert_eq!(cfg.cache.capacity, 100);
        assert!((cfg.cache.similarity_threshold - 0.85).abs() < 1e-6);
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.ledger_capacity, 1000);
    }

    #[test]
    fn test_partial_toml() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            max_steps = 12

            [cache]
            capacity = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_steps, 12);
        assert_eq!(cfg.cache.capacity, 10);
        // Unset fields fall back to defaults.
        assert!((cfg.cache.similarity_threshold - 0.85).abs() < 1e-6);
        assert_eq!(cfg.wall_clock_budget_ms, 120_000);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.max_steps, EngineConfig::default().max_steps);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("max_steps = \"many\"").unwrap_err();
        assert!(matches!(err, WeftError::Config(_)));
    }
}
