//! Chat endpoint: conversation in, executed Jira work out.

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use nesora_core::{truncate_for_log, NesoraError};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::execute::WorkflowResponse;
use crate::assistant::{interpret_reply, ChatMessage};
use crate::error::ApiError;
use crate::parser::{parse_query, request_context};
use crate::state::AppState;

const PARSER_FAILED_NOTE: &str =
    "\n\n⚠️ Parser workflow failed. Please check that the automation workflows are running.";
const NO_INTENTS_NOTE: &str =
    "\n\n⚠️ I couldn't determine the specific actions to take. Please add a bit more detail.";

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default, alias = "userId")]
    pub user_id: String,

    #[serde(default, alias = "jiraDomain")]
    pub jira_domain: String,
}

/// Answer a chat turn, running Jira operations when the user asked for some.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let span = info_span!("chat", request_id = %Uuid::new_v4(), user_id = %req.user_id);
    handle_chat(state, req).instrument(span).await
}

async fn handle_chat(state: AppState, req: ChatRequest) -> Result<Response, ApiError> {
    info!(
        messages = req.messages.len(),
        jira_domain = %req.jira_domain,
        "📨 Chat request"
    );

    let text = state.assistant.complete(&req.messages).await?;
    let reply = interpret_reply(&text, &req.messages);

    let action = match reply.runnable_action().cloned() {
        Some(action) => action,
        None => {
            info!("💬 Returning chat response");
            return Ok(Json(reply).into_response());
        }
    };

    info!(query = %truncate_for_log(&action.query, 100), "🔧 Executing action");
    let message = reply.message_or_empty();
    let context = request_context(&action.context, state.default_project_key());

    let outcome = match parse_query(
        state.transport.as_ref(),
        &state.endpoints().parser,
        &req.user_id,
        &req.jira_domain,
        &action.query,
        context,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = %err, "❌ Parser failed");
            let (error, body) = match &err {
                NesoraError::Http { status, reason, body } => {
                    (format!("HTTP {status} {reason}"), body.clone())
                }
                other => (other.to_string(), String::new()),
            };
            return Err(ApiError::new(
                StatusCode::BAD_GATEWAY,
                json!({
                    "message": format!("{message}{PARSER_FAILED_NOTE}"),
                    "error": error,
                    "body": body,
                }),
            ));
        }
    };

    if outcome.is_empty_or_failed() {
        info!("⚠️ No intents parsed, returning clarification");
        return Ok(Json(json!({
            "message": format!("{message}{NO_INTENTS_NOTE}"),
            "parser": outcome.response,
        }))
        .into_response());
    }

    let report = state
        .orchestrator
        .run(&outcome.intents, &req.user_id, &req.jira_domain)
        .await;

    Ok(Json(WorkflowResponse::new(Some(message.to_string()), report)).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use nesora_orchestrator::{ScriptedReply, ScriptedTransport};
    use serde_json::{json, Value};

    use crate::api::test_support::{test_state, webhook, GATEWAY};

    fn server(transport: Arc<ScriptedTransport>) -> TestServer {
        TestServer::new(crate::create_router(test_state(transport))).unwrap()
    }

    fn completion(content: &str) -> ScriptedReply {
        ScriptedReply::Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
    }

    fn ask(text: &str) -> Value {
        json!({
            "messages": [{"role": "user", "content": text}],
            "userId": "user-1",
            "jiraDomain": "acme.atlassian.net"
        })
    }

    #[tokio::test]
    async fn test_chat_runs_parsed_intents() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(
                    GATEWAY,
                    completion(
                        r#"{"needsClarification": false, "message": "✅ Creating it",
                            "action": {"query": "create a login bug", "context": {"source": "nesora"}}}"#,
                    ),
                )
                .on(
                    webhook("parser"),
                    ScriptedReply::Json(json!([{"json": {"intents": [
                        {"id": "create1", "intent": "create_ticket", "payload": {"summary": "Login bug"}}
                    ]}}])),
                )
                .on(
                    webhook("create"),
                    ScriptedReply::Json(json!({"created": [{"key": "NT-12", "summary": "Login bug"}]})),
                ),
        );

        let response = server(transport.clone()).post("/api/v1/chat").json(&ask("create a login bug")).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "✅ Creating it");
        assert_eq!(body["workflowResult"]["status"], "success");
        assert!(body["formattedResult"].as_str().unwrap().contains("NT-12"));

        let parser_body = &transport.bodies_for(&webhook("parser"))[0];
        assert_eq!(parser_body["user_id"], "user-1");
        assert_eq!(parser_body["context"]["project_key"], "NT");
        let create_body = &transport.bodies_for(&webhook("create"))[0];
        assert_eq!(create_body["summary"], "Login bug");
    }

    #[tokio::test]
    async fn test_chat_clarification_passthrough() {
        let transport = Arc::new(ScriptedTransport::new().on(
            GATEWAY,
            completion(r#"{"needsClarification": true, "message": "Which project?"}"#),
        ));

        let response = server(transport.clone()).post("/api/v1/chat").json(&ask("make a ticket")).await;

        response.assert_status_ok();
        response.assert_json(&json!({"needsClarification": true, "message": "Which project?"}));
        assert!(transport.bodies_for(&webhook("parser")).is_empty());
    }

    #[tokio::test]
    async fn test_chat_falls_back_to_parser_for_plain_text() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(GATEWAY, completion("Sure, let me look."))
                .on(webhook("parser"), ScriptedReply::Json(json!({"status": "error", "message": "unclear"}))),
        );

        let response = server(transport.clone())
            .post("/api/v1/chat")
            .json(&ask("show me open tickets"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Sure, let me look.\n\n⚠️ I couldn't determine"));
        assert_eq!(body["parser"]["message"], "unclear");
        assert_eq!(
            transport.bodies_for(&webhook("parser"))[0]["query"],
            "show me open tickets"
        );
    }

    #[tokio::test]
    async fn test_chat_parser_failure_is_bad_gateway() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(GATEWAY, completion("{\"message\": \"On it\"}"))
                .on(webhook("parser"), ScriptedReply::Status(500, "boom".into())),
        );

        let response = server(transport).post("/api/v1/chat").json(&ask("close NT-3")).await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "HTTP 500 Internal Server Error");
        assert_eq!(body["body"], "boom");
        assert!(body["message"].as_str().unwrap().starts_with("On it"));
    }

    #[tokio::test]
    async fn test_chat_rate_limited() {
        let transport = Arc::new(
            ScriptedTransport::new().on(GATEWAY, ScriptedReply::Status(429, "slow down".into())),
        );

        let response = server(transport).post("/api/v1/chat").json(&ask("close NT-3")).await;

        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        response.assert_json(&json!({"error": "Rate limit exceeded. Please try again in a moment."}));
    }

    #[tokio::test]
    async fn test_chat_payment_required() {
        let transport = Arc::new(
            ScriptedTransport::new().on(GATEWAY, ScriptedReply::Status(402, "no credits".into())),
        );

        let response = server(transport).post("/api/v1/chat").json(&ask("close NT-3")).await;

        response.assert_status(StatusCode::PAYMENT_REQUIRED);
    }
}
