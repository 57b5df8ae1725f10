//! Cost optimizer node: lightweight post-processing pass that records the
//! nominal optimization cost on the trace.

use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use weft_analytics::node_cost;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};

use crate::node::{names, tags, WorkflowNode};

pub struct CostOptimizerNode;

impl WorkflowNode for CostOptimizerNode {
    fn name(&self) -> &'static str {
        names::COST_OPTIMIZER
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let nominal = node_cost(tags::COST_OPTIMIZER);
            debug!(
                prompt_cost = state.prompt_cost,
                nominal, "cost optimization pass"
            );
            Ok(StateUpdate::from_node(self.name(), tags::COST_OPTIMIZER)
                .with_optimization("cost_review")
                .with_meta("cost_optimizer_cost", json!(nominal)))
        })
    }
}
