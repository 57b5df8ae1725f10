//! Rolling cost ledger and predictive cost analytics.

pub mod costs;
pub mod ledger;
pub mod report;

pub use costs::{node_cost, total_run_cost, MIN_NODE_COST};
pub use ledger::CostLedger;
pub use report::{analyze, CostReport, Trend};
