//! Application state.

use std::sync::Arc;

use nesora_orchestrator::{EndpointTable, Orchestrator, OrchestratorConfig, Transport};

use crate::assistant::{Assistant, AssistantConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Intent batch runner.
    pub orchestrator: Arc<Orchestrator>,

    /// LLM gateway client.
    pub assistant: Arc<Assistant>,

    /// Outbound calls that bypass the orchestrator (parser, connect).
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    /// Create the state; every component shares `transport`.
    pub fn new(
        config: OrchestratorConfig,
        assistant: AssistantConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(config, transport.clone())),
            assistant: Arc::new(Assistant::new(assistant, transport.clone())),
            transport,
        }
    }

    /// Automation backend endpoints.
    pub fn endpoints(&self) -> &EndpointTable {
        &self.orchestrator.config().endpoints
    }

    pub fn default_project_key(&self) -> &str {
        &self.orchestrator.config().default_project_key
    }
}
