//! Jira connection endpoint.
//!
//! Forwards the user's Jira credentials to the automation backend's connect
//! workflow, which stores them for later ticket operations.

use axum::{extract::State, http::StatusCode, Json};
use nesora_core::{truncate_for_log, NesoraError};
use nesora_orchestrator::OutboundRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

/// Request to connect a Jira site.
#[derive(Debug, Deserialize, Serialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub jira_domain: String,
    #[serde(default)]
    pub jira_email: String,
    #[serde(default)]
    pub jira_token: String,
}

impl ConnectRequest {
    fn is_complete(&self) -> bool {
        [&self.user_id, &self.jira_domain, &self.jira_email, &self.jira_token]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> ApiError {
    ApiError::new(status, json!({ "status": "error", "message": message.into() }))
}

/// Connect a Jira site for a user.
pub async fn connect_jira(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<Value>, ApiError> {
    if !req.is_complete() {
        return Err(failure(StatusCode::BAD_REQUEST, "Missing required fields"));
    }

    let url = state.endpoints().connect.as_str();
    info!(user_id = %req.user_id, jira_domain = %req.jira_domain, url = %url, "📤 Connecting Jira site");

    let body = serde_json::to_value(&req).map_err(NesoraError::from)?;
    let raw = match state.transport.post_json(OutboundRequest::new(url, &body)).await {
        Ok(raw) => raw,
        Err(NesoraError::Http { status, body, .. }) => {
            error!(status, body = %truncate_for_log(&body, 200), "❌ Connect workflow error");
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(failure(code, format!("Connection failed ({status}): {body}")));
        }
        Err(err) => {
            error!(error = %err, "❌ Connect workflow unreachable");
            return Err(failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()));
        }
    };

    let result = first_result(raw);
    info!(result = %truncate_for_log(&result.to_string(), 200), "✅ Connection result");

    if result.get("status").and_then(Value::as_str) == Some("error") {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, result));
    }

    let mut merged = Map::new();
    merged.insert("status".to_string(), Value::String("success".to_string()));
    if let Value::Object(fields) = result {
        merged.extend(fields);
    }
    Ok(Json(Value::Object(merged)))
}

/// First element of an array response, with any `json` envelope removed.
fn first_result(raw: Value) -> Value {
    let first = match raw {
        Value::Array(elements) => elements.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    match first {
        Value::Object(mut map) if map.contains_key("json") => {
            map.remove("json").unwrap_or(Value::Null)
        }
        other => other,
    }
}
