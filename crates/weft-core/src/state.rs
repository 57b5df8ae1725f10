//! Run-state and the per-field merge engine.
//!
//! A `RunState` is created once per invocation and mutated only by the
//! executor folding in `StateUpdate`s produced by nodes. Each field carries
//! a fixed combination strategy:
//!
//! - scalars (`current_agent`, `cache_hit`, `risk_level`, `refined_prompt`,
//!   `prompt_cost`, `needs_web_data`): override when present
//! - sequences (`messages`, `optimizations_applied`, `agent_path`,
//!   `web_sources`, `scraping_results`): append in order
//! - accumulators (`failure_count`): sum
//! - maps (`metadata`): shallow merge, update keys win

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, ChatMode, RetrievalOutcome, RiskLevel, Role};

/// Caller-supplied options for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub chat_mode: Option<ChatMode>,
    #[serde(default)]
    pub cost_budget: Option<f64>,
    #[serde(default)]
    pub previous_messages: Vec<ChatMessage>,
}

/// Terminal snapshot returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub response_text: String,
    pub cost: f64,
    pub agent_path: Vec<String>,
    pub optimizations_applied: Vec<String>,
    pub cache_hit: bool,
    pub risk_level: RiskLevel,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The full shared state of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub conversation_id: String,
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub current_agent: String,
    pub chat_mode: ChatMode,
    pub cost_budget: f64,
    pub prompt_cost: f64,
    pub refined_prompt: Option<String>,
    pub optimizations_applied: Vec<String>,
    pub cache_hit: bool,
    pub agent_path: Vec<String>,
    pub risk_level: RiskLevel,
    pub failure_count: u32,
    pub needs_web_data: bool,
    pub web_sources: Vec<String>,
    pub scraping_results: Vec<RetrievalOutcome>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub started_at: DateTime<Utc>,
}

impl RunState {
    /// Create the state for a fresh run. `previous_messages` seed the
    /// conversation before the new user message is appended.
    pub fn new(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
        chat_mode: ChatMode,
        cost_budget: f64,
        previous_messages: Vec<ChatMessage>,
    ) -> Self {
        let mut messages = previous_messages;
        messages.push(ChatMessage::user(message));
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            messages,
            current_agent: String::new(),
            chat_mode,
            cost_budget,
            prompt_cost: 0.0,
            refined_prompt: None,
            optimizations_applied: Vec::new(),
            cache_hit: false,
            agent_path: Vec::new(),
            risk_level: RiskLevel::default(),
            failure_count: 0,
            needs_web_data: false,
            web_sources: Vec::new(),
            scraping_results: Vec::new(),
            metadata: HashMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Fold a partial update into this state, field by field.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(v) = update.current_agent {
            self.current_agent = v;
        }
        if let Some(v) = update.cache_hit {
            self.cache_hit = v;
        }
        if let Some(v) = update.risk_level {
            self.risk_level = v;
        }
        if let Some(v) = update.refined_prompt {
            self.refined_prompt = Some(v);
        }
        if let Some(v) = update.prompt_cost {
            self.prompt_cost = v;
        }
        if let Some(v) = update.needs_web_data {
            self.needs_web_data = v;
        }
        self.messages.extend(update.messages);
        self.optimizations_applied
            .extend(update.optimizations_applied);
        self.agent_path.extend(update.agent_path);
        self.web_sources.extend(update.web_sources);
        self.scraping_results.extend(update.scraping_results);
        self.failure_count += update.failure_count;
        for (k, v) in update.metadata {
            self.metadata.insert(k, v);
        }
    }

    /// The raw text of the newest user message.
    pub fn user_message(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// The prompt nodes should work from: the refined prompt if the
    /// analyzer produced one, else the raw user message.
    pub fn effective_prompt(&self) -> &str {
        self.refined_prompt
            .as_deref()
            .unwrap_or_else(|| self.user_message())
    }

    /// The newest agent response, if any node has produced one.
    pub fn last_response(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Agent)
            .map(|m| m.content.as_str())
    }

    /// Last entry in the execution trace.
    pub fn last_path_tag(&self) -> Option<&str> {
        self.agent_path.last().map(|s| s.as_str())
    }

    /// Whether a metadata key holds boolean `true`.
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Project the terminal snapshot handed back to the caller.
    pub fn into_output(self, cost: f64) -> RunOutput {
        let response_text = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Agent)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        RunOutput {
            response_text,
            cost,
            agent_path: self.agent_path,
            optimizations_applied: self.optimizations_applied,
            cache_hit: self.cache_hit,
            risk_level: self.risk_level,
            metadata: self.metadata,
        }
    }
}

/// A sparse update produced by one node, naming only changed fields.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub current_agent: Option<String>,
    pub cache_hit: Option<bool>,
    pub risk_level: Option<RiskLevel>,
    pub refined_prompt: Option<String>,
    pub prompt_cost: Option<f64>,
    pub needs_web_data: Option<bool>,
    pub messages: Vec<ChatMessage>,
    pub optimizations_applied: Vec<String>,
    pub agent_path: Vec<String>,
    pub web_sources: Vec<String>,
    pub scraping_results: Vec<RetrievalOutcome>,
    pub failure_count: u32,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path tag and mark the producing node as current.
    pub fn from_node(node: &str, path_tag: impl Into<String>) -> Self {
        Self {
            current_agent: Some(node.to_string()),
            agent_path: vec![path_tag.into()],
            ..Self::default()
        }
    }

    /// The uniform failure update: one increment plus an `_error` tag.
    pub fn failure(node: &str) -> Self {
        Self {
            current_agent: Some(node.to_string()),
            agent_path: vec![format!("{node}_error")],
            failure_count: 1,
            ..Self::default()
        }
    }

    pub fn with_message(mut self, msg: ChatMessage) -> Self {
        self.messages.push(msg);
        self
    }

    pub fn with_optimization(mut self, tag: impl Into<String>) -> Self {
        self.optimizations_applied.push(tag.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_risk(mut self, level: RiskLevel) -> Self {
        self.risk_level = Some(level);
        self
    }
}
