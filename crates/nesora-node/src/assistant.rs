//! Chat assistant: the LLM gateway call and interpretation of its reply.

use std::sync::Arc;

use nesora_core::{truncate_for_log, NesoraError, Result};
use nesora_orchestrator::{OutboundRequest, Transport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

/// OpenAI-compatible chat completions endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";

/// Model requested from the gateway.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Value of `context.source` on parser requests.
pub const REQUEST_SOURCE: &str = "nesora";

const SYSTEM_PROMPT: &str = r#"You are Nesora, an AI-powered Jira Execution Assistant. Return **ONLY** valid JSON per the schemas below.
If you need to respond in natural language, put it in the "message" field. Never include extra text outside JSON.

When executing Jira operations (preferred when the user asks to do something):
{
  "needsClarification": false,
  "message": "✅ ...human-friendly summary...",
  "action": {
    "query": "<user-intent in natural language>",
    "context": {
      "source": "nesora",
      "project_key": "NT"
    }
  }
}

When needing clarification:
{
  "needsClarification": true,
  "message": "One question to unblock execution"
}

When only chatting:
{
  "needsClarification": false,
  "message": "short helpful text"
}"#;

/// Minimum length of the last user message for the parser fallback.
const FALLBACK_MIN_CHARS: usize = 3;

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Work the assistant wants done: a natural-language query for the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantAction {
    pub query: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// The structured reply the system prompt asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    #[serde(default)]
    pub needs_clarification: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AssistantAction>,

    /// Anything else the model returned, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssistantReply {
    /// The action to run, unless the model asked for clarification.
    pub fn runnable_action(&self) -> Option<&AssistantAction> {
        if self.needs_clarification {
            None
        } else {
            self.action.as_ref()
        }
    }

    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// Gateway settings.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Client for the LLM gateway.
pub struct Assistant {
    config: AssistantConfig,
    transport: Arc<dyn Transport>,
}

impl Assistant {
    pub fn new(config: AssistantConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Ask the model for the next reply to `messages`; returns the raw text.
    ///
    /// Fails with [`NesoraError::Config`] when no API key is set and with
    /// [`NesoraError::Gateway`] when the gateway call fails.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| NesoraError::Config("AI_GATEWAY_API_KEY is not configured".to_string()))?;

        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(ChatMessage::new("system", SYSTEM_PROMPT));
        conversation.extend_from_slice(messages);

        let body = json!({
            "model": self.config.model,
            "messages": conversation,
        });

        info!(model = %self.config.model, turns = messages.len(), "🤖 Calling AI gateway");

        let raw = self
            .transport
            .post_json(OutboundRequest::new(&self.config.gateway_url, &body).with_bearer(api_key))
            .await
            .map_err(gateway_error)?;

        let text = raw
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        info!(reply = %truncate_for_log(&text, 200), "🤖 AI response");
        Ok(text)
    }
}

fn gateway_error(err: NesoraError) -> NesoraError {
    error!(error = %err, "❌ AI gateway error");
    let (status, message) = match err {
        NesoraError::Http { status: 429, .. } => {
            (429, "Rate limit exceeded. Please try again in a moment.")
        }
        NesoraError::Http { status: 402, .. } => {
            (402, "AI service requires payment. Please add credits.")
        }
        _ => (500, "AI service error"),
    };
    NesoraError::Gateway {
        status,
        message: message.to_string(),
    }
}

/// Pull a JSON object out of model output: the whole text, else the slice
/// from the first `{` to the last `}`.
pub fn extract_json_from_text(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Turn model output into a reply, falling back to the parser when the
/// model proposed nothing but the user clearly typed a request.
pub fn interpret_reply(text: &str, messages: &[ChatMessage]) -> AssistantReply {
    let mut reply = extract_json_from_text(text)
        .and_then(|value| serde_json::from_value::<AssistantReply>(value).ok())
        .unwrap_or_else(|| AssistantReply {
            message: Some(text.to_string()),
            ..AssistantReply::default()
        });

    let last_user = last_user_message(messages);
    if !reply.needs_clarification
        && reply.action.is_none()
        && last_user.chars().count() > FALLBACK_MIN_CHARS
    {
        info!(query = %truncate_for_log(last_user, 50), "📝 Fallback to parser");
        if reply.message.is_none() {
            reply.message = Some(format!("🎯 Working on your request: {last_user}"));
        }
        reply.action = Some(AssistantAction {
            query: last_user.to_string(),
            context: Map::new(),
        });
    }

    reply
}

/// Content of the most recent user turn, trimmed.
pub fn last_user_message(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.trim())
        .unwrap_or_default()
}
