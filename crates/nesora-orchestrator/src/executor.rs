//! Single-intent execution.

use std::sync::Arc;
use std::time::Duration;

use nesora_core::{
    attach_unified_items, build_payload, truncate_for_log, unwrap, ExecutionContext,
    ExecutionResult, Intent, NesoraError, OperationKind, Result,
};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::{EndpointTable, OrchestratorConfig};
use crate::transport::{OutboundRequest, Transport};

const LOG_PREVIEW_CHARS: usize = 300;

/// Who a batch runs for: the signed-in user and their Jira site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub actor_id: String,
    pub domain: String,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            domain: domain.into(),
        }
    }
}

/// Executes one intent against its operation endpoint.
pub struct IntentExecutor {
    endpoints: EndpointTable,
    default_project_key: String,
    request_timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl IntentExecutor {
    /// Create an executor from config and a transport.
    pub fn new(config: &OrchestratorConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            default_project_key: config.default_project_key.clone(),
            request_timeout: config.request_timeout(),
            transport,
        }
    }

    /// Operation kind and endpoint for `intent`, or `UnknownOperation`.
    pub fn endpoint_for(&self, intent: &Intent) -> Result<(OperationKind, &str)> {
        intent
            .operation()
            .and_then(|kind| self.endpoints.operation(kind).map(|url| (kind, url)))
            .ok_or_else(|| NesoraError::UnknownOperation {
                name: intent.name.clone(),
            })
    }

    /// Run `intent` and capture its outcome. Never fails: every error is
    /// folded into an error result.
    pub async fn execute_one(
        &self,
        intent: &Intent,
        context: &ExecutionContext,
        actor: &Actor,
    ) -> ExecutionResult {
        let id = intent.id();
        info!(intent_id = %id, intent = %intent.name, "📤 Executing intent");

        match self.try_execute(intent, context, actor).await {
            Ok(data) => {
                info!(intent_id = %id, intent = %intent.name, "✅ Intent completed");
                ExecutionResult::success(id, &intent.name, data)
            }
            Err(err) => {
                error!(intent_id = %id, intent = %intent.name, error = %err, "❌ Intent failed");
                ExecutionResult::failure(id, &intent.name, err)
            }
        }
    }

    async fn try_execute(
        &self,
        intent: &Intent,
        context: &ExecutionContext,
        actor: &Actor,
    ) -> Result<Value> {
        let (_, url) = self.endpoint_for(intent)?;

        let mut payload = self.base_payload(intent, actor);
        if let Some(build) = &intent.build {
            payload = build_payload(build, context, payload);
        }
        let body = Value::Object(payload);

        debug!(
            intent_id = %intent.id(),
            url = %url,
            payload = %truncate_for_log(&body.to_string(), LOG_PREVIEW_CHARS),
            "calling operation endpoint"
        );

        let call = self.transport.post_json(OutboundRequest::new(url, &body));
        let raw = tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| NesoraError::Timeout {
                duration_ms: u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        debug!(
            intent_id = %intent.id(),
            response = %truncate_for_log(&raw.to_string(), LOG_PREVIEW_CHARS),
            "raw response"
        );

        let mut out = unwrap(&raw);
        attach_unified_items(&mut out);
        Ok(out)
    }

    /// `{user_id, project_key, jira_domain, ...intent.payload}`, with
    /// `project_id` defaulted from `project_key`.
    pub fn base_payload(&self, intent: &Intent, actor: &Actor) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("user_id".to_string(), Value::String(actor.actor_id.clone()));

        let project_key = intent
            .payload
            .get("project_key")
            .filter(|v| is_truthy(v))
            .cloned()
            .unwrap_or_else(|| Value::String(self.default_project_key.clone()));
        payload.insert("project_key".to_string(), project_key);
        payload.insert("jira_domain".to_string(), Value::String(actor.domain.clone()));

        for (key, value) in &intent.payload {
            payload.insert(key.clone(), value.clone());
        }

        let has_project_id = payload.get("project_id").is_some_and(is_truthy);
        if !has_project_id {
            if let Some(key) = payload.get("project_key").filter(|v| is_truthy(v)).cloned() {
                payload.insert("project_id".to_string(), key);
            }
        }

        payload
    }
}

/// Loose truthiness used for payload defaults: null, false, 0 and "" are unset.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedReply, ScriptedTransport};
    use nesora_core::{BuildInstruction, ResultStatus};
    use serde_json::json;

    const BASE: &str = "http://flows.test";

    fn executor(transport: Arc<ScriptedTransport>) -> IntentExecutor {
        IntentExecutor::new(&OrchestratorConfig::for_base_url(BASE), transport)
    }

    fn url(segment: &str) -> String {
        format!("{BASE}/webhook/mcp/{segment}")
    }

    fn actor() -> Actor {
        Actor::new("user-1", "acme.atlassian.net")
    }

    #[test]
    fn test_base_payload_defaults() {
        let exec = executor(Arc::new(ScriptedTransport::new()));
        let intent = Intent::builder("create_ticket").field("summary", "Fix login").build();

        let payload = exec.base_payload(&intent, &actor());
        assert_eq!(payload["user_id"], json!("user-1"));
        assert_eq!(payload["project_key"], json!("NT"));
        assert_eq!(payload["project_id"], json!("NT"));
        assert_eq!(payload["jira_domain"], json!("acme.atlassian.net"));
        assert_eq!(payload["summary"], json!("Fix login"));
    }

    #[test]
    fn test_base_payload_respects_intent_fields() {
        let exec = executor(Arc::new(ScriptedTransport::new()));
        let intent = Intent::builder("fetch_ticket")
            .field("project_key", "OPS")
            .field("project_id", "10042")
            .build();

        let payload = exec.base_payload(&intent, &actor());
        assert_eq!(payload["project_key"], json!("OPS"));
        assert_eq!(payload["project_id"], json!("10042"));
    }

    #[tokio::test]
    async fn test_success_unwraps_and_attaches_items() {
        let transport = Arc::new(ScriptedTransport::new().on(
            url("fetch"),
            ScriptedReply::Json(json!([{"json": {"issues": [{"key": "NT-1"}]}}])),
        ));
        let exec = executor(transport.clone());
        let intent = Intent::builder("fetch_ticket").id("fetch1").build();

        let result = exec.execute_one(&intent, &ExecutionContext::new(), &actor()).await;

        assert_eq!(result.status, ResultStatus::Success);
        let data = result.data.unwrap();
        assert_eq!(data["issues"], json!([{"key": "NT-1"}]));
        assert_eq!(data["data"]["items"], json!([{"key": "NT-1"}]));
        assert_eq!(transport.bodies_for(&url("fetch"))[0]["user_id"], json!("user-1"));
    }

    #[tokio::test]
    async fn test_http_error_is_captured() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(url("delete"), ScriptedReply::Status(500, "workflow crashed".into())),
        );
        let exec = executor(transport);
        let intent = Intent::builder("delete_ticket").build();

        let result = exec.execute_one(&intent, &ExecutionContext::new(), &actor()).await;

        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.id, "delete_ticket");
        assert_eq!(
            result.error.as_deref(),
            Some("HTTP 500: Internal Server Error - workflow crashed")
        );
    }

    #[tokio::test]
    async fn test_unknown_operation_makes_no_call() {
        let transport = Arc::new(ScriptedTransport::new());
        let exec = executor(transport.clone());
        let intent = Intent::builder("archive_ticket").build();

        let result = exec.execute_one(&intent, &ExecutionContext::new(), &actor()).await;

        assert_eq!(result.error.as_deref(), Some("Unknown intent: archive_ticket"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unbound_operation_is_unknown() {
        let config = OrchestratorConfig {
            endpoints: EndpointTable::empty(url("parser"), url("connect"))
                .bind(OperationKind::FetchTicket, url("fetch")),
            ..OrchestratorConfig::default()
        };
        let exec = IntentExecutor::new(&config, Arc::new(ScriptedTransport::new()));

        assert!(exec.endpoint_for(&Intent::builder("fetch").build()).is_ok());
        assert!(matches!(
            exec.endpoint_for(&Intent::builder("comment").build()),
            Err(NesoraError::UnknownOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_fails_only_this_call() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(url("fetch"), ScriptedReply::Json(json!({"items": []})))
                .delay(url("fetch"), Duration::from_secs(5)),
        );
        let config = OrchestratorConfig::for_base_url(BASE)
            .with_request_timeout(Duration::from_millis(50));
        let exec = IntentExecutor::new(&config, transport);

        let result = exec
            .execute_one(&Intent::builder("fetch").build(), &ExecutionContext::new(), &actor())
            .await;

        assert_eq!(result.error.as_deref(), Some("Request timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_build_instruction_shapes_payload() {
        let transport = Arc::new(
            ScriptedTransport::new().on(url("update"), ScriptedReply::Json(json!({"updated": []}))),
        );
        let exec = executor(transport.clone());
        let mut context = ExecutionContext::new();
        context.record(&ExecutionResult::success(
            "fetch1",
            "fetch_ticket",
            json!({"items": [{"key": "NT-1"}, {"key": "NT-2"}]}),
        ));
        let intent = Intent::builder("update")
            .id("update1")
            .depends_on("fetch1")
            .build_from(
                BuildInstruction::from_path("$ctx.fetch1.items")
                    .map("updates[]", json!({"key": "$it.key", "status": "Done"})),
            )
            .build();

        let result = exec.execute_one(&intent, &context, &actor()).await;

        assert!(result.is_success());
        let body = &transport.bodies_for(&url("update"))[0];
        assert_eq!(
            body["updates"],
            json!([{"key": "NT-1", "status": "Done"}, {"key": "NT-2", "status": "Done"}])
        );
        assert_eq!(body["project_key"], json!("NT"));
    }
}
