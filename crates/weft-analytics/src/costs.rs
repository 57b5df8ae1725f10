//! Nominal per-node cost table.
//!
//! Total run cost is a deterministic function of the agent path plus the
//! analyzer's prompt cost estimate, so billing stays reproducible from the
//! execution trace alone.

/// Cost charged for path tags with no entry in the table.
pub const MIN_NODE_COST: f64 = 0.0001;

/// Nominal cost for a node, keyed by its path tag.
pub fn node_cost(tag: &str) -> f64 {
    match tag {
        "master_agent" => 0.003,
        "synthesis" => 0.004,
        "web_retrieval" => 0.002,
        "domain_utility" => 0.0015,
        "quality_analyst" => 0.001,
        "failure_recovery" => 0.001,
        "query_classifier" => 0.0008,
        "cost_optimizer" => 0.0005,
        _ => MIN_NODE_COST,
    }
}

/// Total cost of a run: prompt estimate plus the nominal cost of every
/// node visited.
pub fn total_run_cost(prompt_cost: f64, agent_path: &[String]) -> f64 {
    prompt_cost + agent_path.iter().map(|t| node_cost(t)).sum::<f64>()
}
