//! Quality analyst node: a cheaper-model self-assessment of the produced
//! answer, mapped onto the run's risk level.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use weft_core::config::RetryConfig;
use weft_core::error::Result;
use weft_core::state::{RunState, StateUpdate};
use weft_core::traits::AiInvoker;
use weft_core::types::{InvokeParams, ModelProfile, RiskLevel};

use crate::node::{names, tags, WorkflowNode};
use crate::retry::with_retry;

/// Structured self-assessment requested from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub score: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

pub struct QualityAnalystNode {
    ai: Arc<dyn AiInvoker>,
    retry: RetryConfig,
}

impl QualityAnalystNode {
    pub fn new(ai: Arc<dyn AiInvoker>, retry: RetryConfig) -> Self {
        Self { ai, retry }
    }
}

/// Map an assessment score onto a risk level, considering what else the
/// run went through.
fn risk_for(score: f64, state: &RunState) -> RiskLevel {
    let recovered = state
        .agent_path
        .iter()
        .any(|t| t == tags::FAILURE_RECOVERY);
    if score < 6.0 || recovered {
        RiskLevel::High
    } else if score < 8.0 || state.optimizations_applied.len() > 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Extract JSON from a response that may contain markdown code fences.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    // Only consider a `}` after the first `{`; a stray closing brace
    // earlier in the text must not produce an inverted slice.
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed[start..].rfind('}') {
            return &trimmed[start..=start + end];
        }
    }
    trimmed
}

impl WorkflowNode for QualityAnalystNode {
    fn name(&self) -> &'static str {
        names::QUALITY_ANALYST
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let answer = state.last_response().unwrap_or("");
            let prompt = format!(
                "Rate the answer below for the given question on a 1-10 scale. \
                 Respond with ONLY valid JSON: {{\"score\": 1-10, \"recommendations\": [\"...\"]}}\n\n\
                 Question: {}\n\nAnswer: {}",
                state.effective_prompt(),
                answer
            );

            let assessment = match with_retry("quality", &self.retry, || {
                self.ai
                    .invoke(&prompt, ModelProfile::Economical, InvokeParams::default())
            })
            .await
            {
                Ok(completion) => {
                    match serde_json::from_str::<Assessment>(extract_json(&completion.text)) {
                        Ok(a) => a,
                        Err(e) => {
                            warn!(error = %e, "assessment parse failed, assuming middling score");
                            Assessment {
                                score: 7.0,
                                recommendations: vec![],
                            }
                        }
                    }
                }
                // Review trouble never fails a run that already has an
                // answer; fall back to a conservative middling score.
                Err(e) => {
                    warn!(error = %e, "quality review call failed");
                    Assessment {
                        score: 7.0,
                        recommendations: vec![],
                    }
                }
            };

            let risk = risk_for(assessment.score, state);
            debug!(score = assessment.score, risk = ?risk, "quality review complete");

            let mut update = StateUpdate::from_node(self.name(), tags::QUALITY_ANALYST)
                .with_risk(risk)
                .with_meta("quality_score", json!(assessment.score));
            if !assessment.recommendations.is_empty() {
                update =
                    update.with_meta("quality_recommendations", json!(assessment.recommendations));
            }
            Ok(update)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::types::ChatMode;
    use weft_test_utils::MockAiInvoker;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            call_timeout_ms: 1000,
        }
    }

    fn state() -> RunState {
        let mut s = RunState::new("c1", "u1", "hi", ChatMode::Balanced, 0.10, vec![]);
        s.apply(StateUpdate {
            messages: vec![weft_core::types::ChatMessage::agent("an answer")],
            ..Default::default()
        });
        s
    }

    #[tokio::test]
    async fn test_high_score_maps_to_low_risk() {
        let ai = Arc::new(MockAiInvoker::new(r#"{"score": 9, "recommendations": []}"#));
        let node = QualityAnalystNode::new(ai.clone(), fast_retry());
        let update = node.run(&state()).await.unwrap();
        assert_eq!(update.risk_level, Some(RiskLevel::Low));
        assert_eq!(update.metadata["quality_score"], json!(9.0));
        assert_eq!(ai.calls()[0].1, ModelProfile::Economical);
    }

    #[tokio::test]
    async fn test_low_score_maps_to_high_risk() {
        let ai = Arc::new(MockAiInvoker::new(r#"{"score": 4}"#));
        let node = QualityAnalystNode::new(ai, fast_retry());
        let update = node.run(&state()).await.unwrap();
        assert_eq!(update.risk_level, Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_middling_score_maps_to_medium_risk() {
        let ai = Arc::new(MockAiInvoker::new(r#"{"score": 7}"#));
        let node = QualityAnalystNode::new(ai, fast_retry());
        let update = node.run(&state()).await.unwrap();
        assert_eq!(update.risk_level, Some(RiskLevel::Medium));
    }

    #[tokio::test]
    async fn test_recovered_run_is_high_risk_regardless_of_score() {
        let ai = Arc::new(MockAiInvoker::new(r#"{"score": 10}"#));
        let node = QualityAnalystNode::new(ai, fast_retry());
        let mut s = state();
        s.apply(StateUpdate {
            agent_path: vec![tags::FAILURE_RECOVERY.into()],
            ..Default::default()
        });
        let update = node.run(&s).await.unwrap();
        assert_eq!(update.risk_level, Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_many_optimizations_cap_at_medium() {
        let ai = Arc::new(MockAiInvoker::new(r#"{"score": 10}"#));
        let node = QualityAnalystNode::new(ai, fast_retry());
        let mut s = state();
        s.apply(StateUpdate {
            optimizations_applied: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        });
        let update = node.run(&s).await.unwrap();
        assert_eq!(update.risk_level, Some(RiskLevel::Medium));
    }

    #[tokio::test]
    async fn test_review_failure_is_nonfatal() {
        let ai = Arc::new(MockAiInvoker::new("unused"));
        ai.fail_next(10);
        let node = QualityAnalystNode::new(ai, fast_retry());
        let update = node.run(&state()).await.unwrap();
        assert_eq!(update.failure_count, 0);
        assert_eq!(update.risk_level, Some(RiskLevel::Medium));
    }

    #[test]
    fn test_extract_json_code_fence() {
        let input = "Here you go:\n```json\n{\"score\": 8, \"recommendations\": [\"tighten\"]}\n```";
        let a: Assessment = serde_json::from_str(extract_json(input)).unwrap();
        assert_eq!(a.score, 8.0);
        assert_eq!(a.recommendations, vec!["tighten"]);
    }

    #[test]
    fn test_extract_json_embedded() {
        let input = "verdict: {\"score\": 6.5} done";
        let a: Assessment = serde_json::from_str(extract_json(input)).unwrap();
        assert_eq!(a.score, 6.5);
    }

    #[test]
    fn test_extract_json_brace_before_opening_brace() {
        // A closing brace ahead of the first opening brace must not
        // produce an inverted slice.
        assert_eq!(extract_json("} oops {"), "} oops {");
        assert_eq!(extract_json("ignore} {\"score\": 5} tail"), "{\"score\": 5}");
    }

    #[tokio::test]
    async fn test_garbled_review_text_falls_back_to_middling_score() {
        let ai = Arc::new(MockAiInvoker::new("} oops {"));
        let node = QualityAnalystNode::new(ai, fast_retry());
        let update = node.run(&state()).await.unwrap();
        assert_eq!(update.metadata["quality_score"], json!(7.0));
        assert_eq!(update.risk_level, Some(RiskLevel::Medium));
    }
}
