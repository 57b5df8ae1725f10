//! Workflow orchestration engine.
//!
//! A run walks a graph of nodes: prompt analysis, optional classification
//! and retrieval, a semantic-cache shortcut, a primary response, and
//! cost/quality review passes. Pure routing functions pick the next node
//! from the merged run-state; the executor enforces the failure-escalation
//! override, the max-step guard, and the wall-clock budget.

pub mod executor;
pub mod node;
pub mod nodes;
pub mod retry;
pub mod routing;

pub use executor::{Capabilities, WorkflowExecutor, FAILURE_THRESHOLD};
pub use node::{names, tags, WorkflowNode};
pub use routing::{next_node, wants_classification, Route};
