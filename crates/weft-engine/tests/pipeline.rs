//! End-to-end runs through the full workflow with mock capabilities.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing_subscriber::EnvFilter;

use weft_core::config::{EngineConfig, RetryConfig};
use weft_core::error::Result;
use weft_core::state::RunOptions;
use weft_core::traits::AiInvoker;
use weft_core::types::{ChatMode, Classification, Completion, InvokeParams, ModelProfile, RiskLevel};
use weft_engine::{tags, Capabilities, WorkflowExecutor};
use weft_test_utils::{MockAiInvoker, MockClassifier, MockDomainUtility, MockRetrievalTool};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=debug,warn")),
        )
        .with_target(false)
        .with_test_writer()
        .try_init();
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        retry: RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
            call_timeout_ms: 5000,
        },
        ..EngineConfig::default()
    }
}

fn executor_with(ai: Arc<MockAiInvoker>, classifier: Arc<MockClassifier>) -> WorkflowExecutor {
    executor_full(ai, classifier, Arc::new(MockRetrievalTool::new()))
}

fn executor_full(
    ai: Arc<MockAiInvoker>,
    classifier: Arc<MockClassifier>,
    retrieval: Arc<MockRetrievalTool>,
) -> WorkflowExecutor {
    init_tracing();
    WorkflowExecutor::new(
        fast_config(),
        Capabilities {
            ai,
            classifier,
            retrieval,
            utility: Arc::new(MockDomainUtility::new()),
        },
    )
}

fn options(mode: ChatMode) -> RunOptions {
    RunOptions {
        chat_mode: Some(mode),
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn balanced_run_takes_the_canonical_path() {
    let ai = Arc::new(MockAiInvoker::new("fallback"));
    ai.push_response("2+2 equals 4.");
    ai.push_response(r#"{"score": 9, "recommendations": []}"#);
    let exec = executor_with(ai, Arc::new(MockClassifier::local_only()));

    let out = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;

    assert_eq!(
        out.agent_path,
        vec![
            tags::PROMPT_ACCEPTABLE,
            tags::CACHE_MISS,
            tags::MASTER_AGENT,
            tags::COST_OPTIMIZER,
            tags::QUALITY_ANALYST
        ]
    );
    assert!(!out.cache_hit);
    assert_eq!(out.response_text, "2+2 equals 4.");
    assert!(out.cost > 0.003);
    assert!(matches!(out.risk_level, RiskLevel::Low | RiskLevel::Medium));
    assert!(out.metadata.contains_key("run_id"));
}

#[tokio::test]
async fn second_identical_message_hits_the_cache() {
    let ai = Arc::new(MockAiInvoker::new(r#"{"score": 9}"#));
    ai.push_response("2+2 equals 4.");
    let exec = executor_with(ai.clone(), Arc::new(MockClassifier::local_only()));

    let first = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;
    assert!(!first.cache_hit);
    let calls_after_first = ai.call_count();

    let second = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;
    assert!(second.cache_hit);
    assert_eq!(second.agent_path.last().map(|s| s.as_str()), Some(tags::CACHE_HIT));
    assert_eq!(second.response_text, "2+2 equals 4.");
    assert!(second
        .optimizations_applied
        .contains(&"semantic_cache".to_string()));
    // No primary response (or any other model call) on the second run.
    assert_eq!(ai.call_count(), calls_after_first);
    // Cached runs cost less than full runs.
    assert!(second.cost < first.cost);
}

#[tokio::test(start_paused = true)]
async fn three_failures_force_recovery() {
    let ai = Arc::new(MockAiInvoker::new("unused"));
    ai.fail_next(100);
    let exec = executor_with(ai, Arc::new(MockClassifier::local_only()));

    let start = tokio::time::Instant::now();
    let out = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;

    assert_eq!(
        out.agent_path,
        vec![
            tags::PROMPT_ACCEPTABLE,
            tags::CACHE_MISS,
            "master_agent_error",
            "master_agent_error",
            "master_agent_error",
            tags::FAILURE_RECOVERY
        ]
    );
    // Recovery backed off min(1000 * 2^3, 30000) = 8s in virtual time.
    assert!(start.elapsed() >= Duration::from_millis(8000));
    assert!(start.elapsed() < Duration::from_millis(30_000));
    assert_eq!(out.risk_level, RiskLevel::High);
    assert!(!out.response_text.is_empty());
    assert!(!out.cache_hit);
}

#[tokio::test]
async fn tight_budget_triggers_prompt_refinement() {
    let ai = Arc::new(MockAiInvoker::new(r#"{"score": 8}"#));
    ai.push_response("Condensed answer.");
    let exec = executor_with(ai, Arc::new(MockClassifier::local_only()));

    let long_message = "please explain in detail the following topic ".repeat(40);
    let out = exec
        .run(
            "c1",
            "u1",
            &long_message,
            RunOptions {
                chat_mode: Some(ChatMode::Balanced),
                cost_budget: Some(0.01),
                ..RunOptions::default()
            },
        )
        .await;

    assert!(out
        .optimizations_applied
        .contains(&"prompt_refinement".to_string()));
    assert_eq!(out.agent_path[0], tags::PROMPT_REFINED);
}

#[tokio::test]
async fn fastest_mode_skips_review_chain() {
    let ai = Arc::new(MockAiInvoker::new("Quick answer."));
    let exec = executor_with(ai.clone(), Arc::new(MockClassifier::local_only()));

    let out = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Fastest))
        .await;

    assert_eq!(out.agent_path.last().map(|s| s.as_str()), Some(tags::MASTER_AGENT));
    assert!(!out.agent_path.contains(&tags::COST_OPTIMIZER.to_string()));
    assert!(!out.agent_path.contains(&tags::QUALITY_ANALYST.to_string()));
    // Only the primary response called the model.
    assert_eq!(ai.call_count(), 1);
}

#[tokio::test]
async fn external_data_query_synthesizes_from_retrieved_sources() {
    let ai = Arc::new(MockAiInvoker::new("According to [1], it rains tomorrow."));
    let classifier = Arc::new(MockClassifier::returning(Classification {
        needs_external_data: true,
        confidence: 0.95,
        query_type: "news".into(),
        suggested_sources: vec!["https://wx.example/forecast".into()],
        extraction_strategy: Some("article".into()),
    }));
    let retrieval = Arc::new(MockRetrievalTool::new().with_page(
        "https://wx.example/forecast",
        "Forecast",
        "Rain expected tomorrow across the region.",
    ));
    let exec = executor_full(ai, classifier, retrieval);

    let out = exec
        .run(
            "c1",
            "u1",
            "What is the weather forecast for tomorrow?",
            options(ChatMode::Balanced),
        )
        .await;

    assert_eq!(
        out.agent_path,
        vec![
            tags::PROMPT_ACCEPTABLE,
            tags::QUERY_CLASSIFIER,
            tags::WEB_RETRIEVAL,
            tags::SYNTHESIS
        ]
    );
    assert!(out.response_text.contains("[1] Forecast"));
    assert_eq!(out.metadata["synthesis_complete"], serde_json::json!(true));
}

#[tokio::test]
async fn failed_retrieval_degrades_to_canned_master_answer() {
    let ai = Arc::new(MockAiInvoker::new(r#"{"score": 8}"#));
    let classifier = Arc::new(MockClassifier::returning(Classification {
        needs_external_data: true,
        confidence: 0.95,
        query_type: "news".into(),
        suggested_sources: vec!["https://down.example".into()],
        extraction_strategy: None,
    }));
    // No pages registered: every source fails.
    let exec = executor_full(ai.clone(), classifier, Arc::new(MockRetrievalTool::new()));

    let out = exec
        .run("c1", "u1", "latest news please", options(ChatMode::Balanced))
        .await;

    assert!(out.agent_path.contains(&tags::MASTER_AGENT.to_string()));
    assert!(out.response_text.contains("couldn't reach the external sources"));
    assert_eq!(out.metadata["fallback"], serde_json::json!(true));
}

#[tokio::test]
async fn utility_query_is_terminal_after_domain_utility() {
    let ai = Arc::new(MockAiInvoker::new("unused"));
    let classifier = Arc::new(MockClassifier::returning(Classification {
        needs_external_data: false,
        confidence: 0.9,
        query_type: "travel".into(),
        suggested_sources: vec![],
        extraction_strategy: None,
    }));
    let exec = executor_with(ai.clone(), classifier);

    let out = exec
        .run(
            "c1",
            "u1",
            "find me a flight to lisbon",
            options(ChatMode::Balanced),
        )
        .await;

    assert_eq!(out.agent_path.last().map(|s| s.as_str()), Some(tags::DOMAIN_UTILITY));
    assert_eq!(out.response_text, "Completed travel request");
    assert_eq!(ai.call_count(), 0);
}

#[tokio::test]
async fn classifier_outage_still_answers() {
    let ai = Arc::new(MockAiInvoker::new("Answered anyway."));
    let exec = executor_with(ai, Arc::new(MockClassifier::failing()));

    let out = exec
        .run(
            "c1",
            "u1",
            "what is the latest news about rust",
            options(ChatMode::Fastest),
        )
        .await;

    assert!(out
        .agent_path
        .contains(&tags::QUERY_CLASSIFIER_ERROR.to_string()));
    assert_eq!(out.response_text, "Answered anyway.");
    assert!(out.metadata.contains_key("classification_error"));
}

/// An invoker that never returns in time.
struct SlowInvoker;

impl AiInvoker for SlowInvoker {
    fn invoke(
        &self,
        _prompt: &str,
        _profile: ModelProfile,
        _params: InvokeParams,
    ) -> BoxFuture<'_, Result<Completion>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Completion {
                text: "too late".into(),
                input_tokens: 0,
                output_tokens: 0,
            })
        })
    }
}

#[tokio::test(start_paused = true)]
async fn wall_clock_budget_is_a_hard_stop() {
    let config = EngineConfig {
        wall_clock_budget_ms: 5000,
        retry: RetryConfig {
            max_retries: 0,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
            call_timeout_ms: 3_600_000,
        },
        ..EngineConfig::default()
    };
    init_tracing();
    let exec = WorkflowExecutor::new(
        config,
        Capabilities {
            ai: Arc::new(SlowInvoker),
            classifier: Arc::new(MockClassifier::local_only()),
            retrieval: Arc::new(MockRetrievalTool::new()),
            utility: Arc::new(MockDomainUtility::new()),
        },
    );

    let out = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;

    assert_eq!(out.agent_path, vec![tags::ERROR_FALLBACK]);
    assert_eq!(out.risk_level, RiskLevel::High);
    assert!(out.response_text.contains("something went wrong"));
    assert!(out.metadata.contains_key("error"));
}

#[tokio::test]
async fn exhausted_step_budget_produces_the_fatal_fallback() {
    let config = EngineConfig {
        max_steps: 1,
        ..fast_config()
    };
    init_tracing();
    let exec = WorkflowExecutor::new(
        config,
        Capabilities {
            ai: Arc::new(MockAiInvoker::new("unused")),
            classifier: Arc::new(MockClassifier::local_only()),
            retrieval: Arc::new(MockRetrievalTool::new()),
            utility: Arc::new(MockDomainUtility::new()),
        },
    );

    let out = exec
        .run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;

    assert_eq!(out.agent_path, vec![tags::ERROR_FALLBACK]);
    assert_eq!(out.risk_level, RiskLevel::High);
    let error = out.metadata["error"].as_str().unwrap();
    assert!(error.contains("max steps"), "unexpected error: {error}");
}

#[tokio::test]
async fn every_run_lands_in_the_ledger() {
    let ai = Arc::new(MockAiInvoker::new(r#"{"score": 9}"#));
    ai.push_response("First answer.");
    let exec = executor_with(ai, Arc::new(MockClassifier::local_only()));

    exec.run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;
    exec.run("c1", "u1", "What is 2+2?", options(ChatMode::Balanced))
        .await;

    assert_eq!(exec.ledger().len(), 2);
    let report = exec.report();
    assert_eq!(report.runs, 2);
    assert!((report.cache_hit_rate - 0.5).abs() < 1e-9);
    assert!(report.average_cost > 0.0);
}
