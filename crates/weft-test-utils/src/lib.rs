//! Mock capability implementations for testing the workflow engine.
//!
//! Every mock records its calls and supports scripted failure injection,
//! so tests can drive retry, degradation, and escalation paths without
//! any real backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;

use weft_core::error::{Result, WeftError};
use weft_core::traits::{AiInvoker, DomainUtilityTool, QueryClassifier, RetrievalTool};
use weft_core::types::{Classification, Completion, InvokeParams, ModelProfile, RetrievedPage};

/// Scripted AI backend.
///
/// Pops queued responses in order, falling back to a default text; injects
/// `fail_next` transient failures before any success.
pub struct MockAiInvoker {
    default_response: String,
    scripted: Mutex<VecDeque<String>>,
    fail_next: Mutex<u32>,
    calls: Mutex<Vec<(String, ModelProfile)>>,
}

impl MockAiInvoker {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            default_response: default_response.into(),
            scripted: Mutex::new(VecDeque::new()),
            fail_next: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one scripted response ahead of the default.
    pub fn push_response(&self, text: impl Into<String>) {
        self.scripted.lock().unwrap().push_back(text.into());
    }

    /// Fail the next `n` invocations with a transient error.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock().unwrap() = n;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Prompts seen so far, with the profile each was invoked under.
    pub fn calls(&self) -> Vec<(String, ModelProfile)> {
        self.calls.lock().unwrap().clone()
    }
}

impl AiInvoker for MockAiInvoker {
    fn invoke(
        &self,
        prompt: &str,
        profile: ModelProfile,
        _params: InvokeParams,
    ) -> BoxFuture<'_, Result<Completion>> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            self.calls.lock().unwrap().push((prompt.clone(), profile));

            {
                let mut failures = self.fail_next.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(WeftError::Invocation("mock: injected 503".into()));
                }
            }

            let text = self
                .scripted
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_response.clone());
            Ok(Completion {
                text,
                input_tokens: (prompt.len() / 4) as u32,
                output_tokens: 64,
            })
        })
    }
}

/// Classifier returning one fixed verdict, or failing outright.
pub struct MockClassifier {
    verdict: Option<Classification>,
    calls: Mutex<u32>,
}

impl MockClassifier {
    pub fn returning(verdict: Classification) -> Self {
        Self {
            verdict: Some(verdict),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            verdict: None,
            calls: Mutex::new(0),
        }
    }

    /// A verdict that needs no external data.
    pub fn local_only() -> Self {
        Self::returning(Classification {
            needs_external_data: false,
            confidence: 0.9,
            query_type: "general".into(),
            suggested_sources: vec![],
            extraction_strategy: None,
        })
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl QueryClassifier for MockClassifier {
    fn classify(&self, _raw_text: &str) -> BoxFuture<'_, Result<Classification>> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            self.verdict
                .clone()
                .ok_or_else(|| WeftError::Classification("mock: classifier down".into()))
        })
    }
}

/// Retrieval tool with per-URL scripted pages; unknown URLs fail.
pub struct MockRetrievalTool {
    pages: HashMap<String, RetrievedPage>,
    calls: Mutex<Vec<String>>,
}

impl MockRetrievalTool {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, title: &str, text: &str) -> Self {
        self.pages.insert(
            url.into(),
            RetrievedPage {
                success: true,
                title: Some(title.to_string()),
                extracted_text: Some(text.to_string()),
            },
        );
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockRetrievalTool {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrievalTool for MockRetrievalTool {
    fn fetch(
        &self,
        source_url: &str,
        _extraction_template: &str,
        _timeout_ms: u64,
    ) -> BoxFuture<'_, Result<RetrievedPage>> {
        let url = source_url.to_string();
        Box::pin(async move {
            self.calls.lock().unwrap().push(url.clone());
            self.pages.get(&url).cloned().ok_or(WeftError::Retrieval {
                url,
                message: "mock: connection refused".into(),
            })
        })
    }
}

/// Domain utility echoing the operation it was asked to perform.
pub struct MockDomainUtility {
    fail: bool,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockDomainUtility {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockDomainUtility {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainUtilityTool for MockDomainUtility {
    fn perform(
        &self,
        operation: &str,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<String>> {
        let operation = operation.to_string();
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((operation.clone(), payload));
            if self.fail {
                Err(WeftError::Utility {
                    operation,
                    message: "mock: upstream unavailable".into(),
                })
            } else {
                Ok(format!("Completed {operation} request"))
            }
        })
    }
}
