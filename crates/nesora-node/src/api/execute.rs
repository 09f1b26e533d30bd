//! Direct intent execution endpoint.

use axum::{extract::State, Json};
use nesora_core::{format_report, AggregateReport, Intent, NesoraError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Request to run an intent batch.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub intents: Vec<Intent>,

    #[serde(default, alias = "userId")]
    pub user_id: String,

    #[serde(default, alias = "jiraDomain")]
    pub jira_domain: String,
}

/// A batch outcome plus its markdown rendering.
///
/// The envelope keys are camelCase (`workflowResult`, `formattedResult`);
/// the report inside keeps its own snake_case fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub workflow_result: AggregateReport,
    pub formatted_result: String,
}

impl WorkflowResponse {
    pub fn new(message: Option<String>, report: AggregateReport) -> Self {
        let formatted_result = format_report(&report);
        Self {
            message,
            workflow_result: report,
            formatted_result,
        }
    }
}

/// Run a batch of intents.
pub async fn execute_intents(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(NesoraError::InvalidRequest("user_id is required".to_string()).into());
    }

    info!(intents = req.intents.len(), user_id = %req.user_id, "📨 Execute request");

    let report = state
        .orchestrator
        .run(&req.intents, &req.user_id, &req.jira_domain)
        .await;

    Ok(Json(WorkflowResponse::new(None, report)))
}
