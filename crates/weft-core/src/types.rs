use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution strategy for a run, fixed at run start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Fastest,
    Cheapest,
    #[default]
    Balanced,
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatMode::Fastest => write!(f, "fastest"),
            ChatMode::Cheapest => write!(f, "cheapest"),
            ChatMode::Balanced => write!(f, "balanced"),
        }
    }
}

/// Quality-review verdict for a run. Last writer wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }
}

/// Outcome of one attempted retrieval source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub source: String,
    pub success: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// Which model tier a capability call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProfile {
    /// Full-strength model for user-facing answers.
    Primary,
    /// Cheaper model for review and recovery passes.
    Economical,
    /// Deterministic model for structured classification.
    Precise,
}

/// Generation parameters for an AI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeParams {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for InvokeParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// A completion returned by an AI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Structured verdict from the external query classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub needs_external_data: bool,
    pub confidence: f64,
    pub query_type: String,
    #[serde(default)]
    pub suggested_sources: Vec<String>,
    #[serde(default)]
    pub extraction_strategy: Option<String>,
}

/// A page fetched by the retrieval capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPage {
    pub success: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// One entry in the rolling cost ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub cost: f64,
    pub chat_mode: ChatMode,
    pub cache_hit: bool,
    pub agent_path: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_mode_serde() {
        let json = serde_json::to_string(&ChatMode::Fastest).unwrap();
        assert_eq!(json, "\"fastest\"");
        let parsed: ChatMode = serde_json::from_str("\"balanced\"").unwrap();
        assert_eq!(parsed, ChatMode::Balanced);
    }

    #[test]
    fn test_message_constructors() {
        let m = ChatMessage::user("hello");
        assert_eq!(m.role, Role::User);
        let m = ChatMessage::agent("hi there");
        assert_eq!(m.role, Role::Agent);
        assert_eq!(m.content, "hi there");
    }

    #[test]
    fn test_classification_defaults() {
        let json = r#"{"needs_external_data": true, "confidence": 0.9, "query_type": "news"}"#;
        let c: Classification = serde_json::from_str(json).unwrap();
        assert!(c.needs_external_data);
        assert!(c.suggested_sources.is_empty());
        assert!(c.extraction_strategy.is_none());
    }

    #[test]
    fn test_invoke_params_defaults() {
        let p = InvokeParams::default();
        assert_eq!(p.max_tokens, 1024);
        assert!((p.temperature - 0.7).abs() < 1e-6);
    }
}
