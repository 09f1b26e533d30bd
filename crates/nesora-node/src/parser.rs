//! Client for the natural-language parser workflow (text -> intents).

use nesora_core::{truncate_for_log, unwrap, Intent, Result};
use nesora_orchestrator::{OutboundRequest, Transport};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::assistant::REQUEST_SOURCE;

/// What the parser produced.
#[derive(Debug, Clone)]
pub struct ParserOutcome {
    /// Unwrapped parser response.
    pub response: Value,
    /// Intents that could be decoded from it.
    pub intents: Vec<Intent>,
}

impl ParserOutcome {
    /// Decode a raw parser response.
    pub fn from_raw(raw: &Value) -> Self {
        let response = unwrap(raw);
        let intents = extract_intents(raw, &response);
        Self { response, intents }
    }

    /// The parser reported an error or found nothing to do.
    pub fn is_empty_or_failed(&self) -> bool {
        self.intents.is_empty()
            || self.response.get("status").and_then(Value::as_str) == Some("error")
    }
}

/// Parser request context: `{source, project_key}` overlaid with `extra`.
pub fn request_context(extra: &Map<String, Value>, default_project_key: &str) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("source".to_string(), Value::String(REQUEST_SOURCE.to_string()));
    context.insert(
        "project_key".to_string(),
        Value::String(default_project_key.to_string()),
    );
    for (key, value) in extra {
        context.insert(key.clone(), value.clone());
    }
    context
}

/// POST `query` to the parser and decode the intents it returns.
pub async fn parse_query(
    transport: &dyn Transport,
    url: &str,
    user_id: &str,
    jira_domain: &str,
    query: &str,
    context: Map<String, Value>,
) -> Result<ParserOutcome> {
    let body = json!({
        "user_id": user_id,
        "query": query,
        "context": context,
        "jira_domain": jira_domain,
    });

    info!(url = %url, "📤 Calling parser");
    let raw = transport.post_json(OutboundRequest::new(url, &body)).await?;
    info!(response = %truncate_for_log(&raw.to_string(), 500), "📥 Parser response");

    let outcome = ParserOutcome::from_raw(&raw);
    info!(
        intents = ?outcome.intents.iter().map(Intent::id).collect::<Vec<_>>(),
        "🎯 Parsed intents"
    );
    Ok(outcome)
}

/// Intents from `intents`, `data.intents`, or a bare array response.
fn extract_intents(raw: &Value, response: &Value) -> Vec<Intent> {
    let listed = response
        .get("intents")
        .and_then(Value::as_array)
        .or_else(|| response.pointer("/data/intents").and_then(Value::as_array))
        .or_else(|| {
            raw.is_array()
                .then(|| response.get("items").and_then(Value::as_array))
                .flatten()
        });

    match listed {
        Some(values) => values.iter().filter_map(decode_intent).collect(),
        // A one-element bare array unwraps to the element itself.
        None if raw.is_array() => decode_intent(response).into_iter().collect(),
        None => Vec::new(),
    }
}

fn decode_intent(value: &Value) -> Option<Intent> {
    match serde_json::from_value::<Intent>(value.clone()) {
        Ok(intent) => Some(intent),
        Err(err) => {
            warn!(error = %err, intent = %truncate_for_log(&value.to_string(), 200), "skipping malformed intent");
            None
        }
    }
}
