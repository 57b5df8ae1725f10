//! The workflow executor: drives nodes through the routing policy,
//! folding each partial update into the run-state until a terminal
//! condition fires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use weft_analytics::{analyze, node_cost, total_run_cost, CostLedger, CostReport};
use weft_cache::SemanticCache;
use weft_core::config::EngineConfig;
use weft_core::error::{Result, WeftError};
use weft_core::state::{RunOptions, RunOutput, RunState, StateUpdate};
use weft_core::traits::{AiInvoker, DomainUtilityTool, QueryClassifier, RetrievalTool};
use weft_core::types::{ChatMessage, LedgerEntry, RiskLevel};

use crate::node::{names, tags, WorkflowNode};
use crate::nodes::{
    CacheLookupNode, CostOptimizerNode, DomainUtilityNode, FailureRecoveryNode, MasterNode,
    PromptAnalyzer, QualityAnalystNode, QueryClassifierNode, RetrievalNode, SynthesisNode,
};
use crate::routing::{next_node, Route};

/// Cumulative failures that force an unconditional transition to recovery.
pub const FAILURE_THRESHOLD: u32 = 3;

/// Fixed response for runs that die outright.
const FATAL_APOLOGY: &str = "I'm sorry - something went wrong while processing your request. \
Please try again.";

/// The pluggable external backends consumed by the node library.
#[derive(Clone)]
pub struct Capabilities {
    pub ai: Arc<dyn AiInvoker>,
    pub classifier: Arc<dyn QueryClassifier>,
    pub retrieval: Arc<dyn RetrievalTool>,
    pub utility: Arc<dyn DomainUtilityTool>,
}

/// Drives one run at a time through the node graph. The executor itself
/// is stateless across runs; the semantic cache and cost ledger are the
/// only process-wide shared structures.
pub struct WorkflowExecutor {
    nodes: HashMap<&'static str, Arc<dyn WorkflowNode>>,
    cache: Arc<SemanticCache>,
    ledger: Arc<CostLedger>,
    config: EngineConfig,
}

impl WorkflowExecutor {
    pub fn new(config: EngineConfig, caps: Capabilities) -> Self {
        let cache = Arc::new(SemanticCache::new(&config.cache));
        let ledger = Arc::new(CostLedger::new(config.ledger_capacity));
        let retry = config.retry.clone();

        let mut nodes: HashMap<&'static str, Arc<dyn WorkflowNode>> = HashMap::new();
        nodes.insert(
            names::PROMPT_ANALYZER,
            Arc::new(PromptAnalyzer::new(config.token_rate)),
        );
        nodes.insert(
            names::SEMANTIC_CACHE,
            Arc::new(CacheLookupNode::new(cache.clone())),
        );
        nodes.insert(
            names::QUERY_CLASSIFIER,
            Arc::new(QueryClassifierNode::new(caps.classifier, retry.clone())),
        );
        nodes.insert(
            names::DOMAIN_UTILITY,
            Arc::new(DomainUtilityNode::new(caps.utility, retry.clone())),
        );
        nodes.insert(
            names::WEB_RETRIEVAL,
            Arc::new(RetrievalNode::new(
                caps.retrieval,
                config.retrieval_timeout_ms,
            )),
        );
        nodes.insert(
            names::SYNTHESIS,
            Arc::new(SynthesisNode::new(caps.ai.clone(), retry.clone())),
        );
        nodes.insert(
            names::MASTER_AGENT,
            Arc::new(MasterNode::new(
                caps.ai.clone(),
                cache.clone(),
                retry.clone(),
            )),
        );
        nodes.insert(names::COST_OPTIMIZER, Arc::new(CostOptimizerNode));
        nodes.insert(
            names::QUALITY_ANALYST,
            Arc::new(QualityAnalystNode::new(caps.ai.clone(), retry)),
        );
        nodes.insert(
            names::FAILURE_RECOVERY,
            Arc::new(FailureRecoveryNode::new(caps.ai)),
        );

        Self {
            nodes,
            cache,
            ledger,
            config,
        }
    }

    /// Process one user message through the workflow.
    ///
    /// Fail-open: every fatal condition (escaped error, max-step guard,
    /// wall-clock budget) is caught here and converted into the fixed
    /// apology output; the caller never sees an error.
    pub async fn run(
        &self,
        conversation_id: &str,
        user_id: &str,
        message: &str,
        options: RunOptions,
    ) -> RunOutput {
        let run_id = Uuid::new_v4();
        let chat_mode = options.chat_mode.unwrap_or_default();
        let cost_budget = options
            .cost_budget
            .filter(|b| *b > 0.0)
            .unwrap_or(self.config.default_cost_budget);

        let mut state = RunState::new(
            conversation_id,
            user_id,
            message,
            chat_mode,
            cost_budget,
            options.previous_messages,
        );
        state
            .metadata
            .insert("run_id".into(), json!(run_id.to_string()));

        info!(
            run_id = %run_id,
            conversation_id,
            chat_mode = %chat_mode,
            cost_budget,
            "run started"
        );

        let budget = Duration::from_millis(self.config.wall_clock_budget_ms);
        let outcome = match tokio::time::timeout(budget, self.drive(state)).await {
            Ok(result) => result,
            Err(_) => Err(WeftError::RunBudgetExceeded(
                self.config.wall_clock_budget_ms,
            )),
        };

        match outcome {
            Ok(state) => {
                let cost = total_run_cost(state.prompt_cost, &state.agent_path);
                self.ledger.record(LedgerEntry {
                    timestamp: Utc::now(),
                    cost,
                    chat_mode: state.chat_mode,
                    cache_hit: state.cache_hit,
                    agent_path: state.agent_path.clone(),
                });
                info!(
                    run_id = %run_id,
                    cost,
                    cache_hit = state.cache_hit,
                    path = ?state.agent_path,
                    "run complete"
                );
                state.into_output(cost)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "run failed fatally");
                let cost = node_cost(tags::ERROR_FALLBACK);
                self.ledger.record(LedgerEntry {
                    timestamp: Utc::now(),
                    cost,
                    chat_mode,
                    cache_hit: false,
                    agent_path: vec![tags::ERROR_FALLBACK.to_string()],
                });
                let mut metadata = HashMap::new();
                metadata.insert("run_id".to_string(), json!(run_id.to_string()));
                metadata.insert("error".to_string(), json!(e.to_string()));
                RunOutput {
                    response_text: FATAL_APOLOGY.to_string(),
                    cost,
                    agent_path: vec![tags::ERROR_FALLBACK.to_string()],
                    optimizations_applied: vec![],
                    cache_hit: false,
                    risk_level: RiskLevel::High,
                    metadata,
                }
            }
        }
    }

    /// The step loop. Terminates on a cache hit, a terminal route, or a
    /// completed recovery; the max-step guard turns routing cycles into a
    /// fatal error instead of an endless run.
    async fn drive(&self, mut state: RunState) -> Result<RunState> {
        for _ in 0..self.config.max_steps {
            if state.cache_hit {
                return Ok(state);
            }

            // Escalation override: enough cumulative failures preempt
            // whatever the routing policy would pick.
            let name = if state.failure_count >= FAILURE_THRESHOLD {
                names::FAILURE_RECOVERY
            } else {
                match next_node(&state) {
                    Route::End => return Ok(state),
                    Route::Node(name) => name,
                }
            };

            let node = self
                .nodes
                .get(name)
                .ok_or_else(|| WeftError::UnknownNode(name.to_string()))?;

            let update = match node.run(&state).await {
                Ok(update) => update,
                Err(e) => {
                    warn!(node = name, error = %e, "node failed, applying failure policy");
                    StateUpdate::failure(name)
                }
            };
            state.apply(update);

            // Recovery is always terminal, even if it errored.
            if name == names::FAILURE_RECOVERY {
                if state.last_path_tag() != Some(tags::FAILURE_RECOVERY) {
                    state.messages.push(ChatMessage::agent(FATAL_APOLOGY));
                }
                return Ok(state);
            }
        }

        Err(WeftError::MaxStepsExceeded(self.config.max_steps))
    }

    /// Shared semantic cache (for outer reporting surfaces).
    pub fn cache(&self) -> &Arc<SemanticCache> {
        &self.cache
    }

    /// Shared cost ledger.
    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// Analytics over the rolling ledger.
    pub fn report(&self) -> CostReport {
        analyze(&self.ledger)
    }
}
