//! The node library: one file per pipeline step.

pub mod cache_gate;
pub mod classifier;
pub mod domain_utility;
pub mod master;
pub mod optimizer;
pub mod prompt_analyzer;
pub mod quality;
pub mod recovery;
pub mod retrieval;
pub mod synthesis;

pub use cache_gate::CacheLookupNode;
pub use classifier::QueryClassifierNode;
pub use domain_utility::DomainUtilityNode;
pub use master::MasterNode;
pub use optimizer::CostOptimizerNode;
pub use prompt_analyzer::PromptAnalyzer;
pub use quality::QualityAnalystNode;
pub use recovery::FailureRecoveryNode;
pub use retrieval::RetrievalNode;
pub use synthesis::SynthesisNode;
