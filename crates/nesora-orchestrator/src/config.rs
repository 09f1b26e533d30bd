//! Orchestrator configuration and the static endpoint table.

use std::collections::BTreeMap;
use std::time::Duration;

use nesora_core::OperationKind;
use serde::{Deserialize, Serialize};

/// Default automation backend (a local n8n instance).
pub const DEFAULT_AUTOMATION_BASE_URL: &str = "http://localhost:5678";

/// Webhook endpoints of the automation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTable {
    /// Natural-language parser (text -> intents).
    pub parser: String,

    /// Jira connection registration.
    pub connect: String,

    /// One endpoint per ticket operation.
    pub operations: BTreeMap<OperationKind, String>,
}

impl EndpointTable {
    /// Standard `<base>/webhook/mcp/<segment>` layout for every operation.
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let operations = OperationKind::ALL
            .into_iter()
            .map(|kind| (kind, format!("{base}/webhook/mcp/{}", kind.webhook_segment())))
            .collect();

        Self {
            parser: format!("{base}/webhook/mcp/parser"),
            connect: format!("{base}/webhook/mcp/connect"),
            operations,
        }
    }

    /// Table with no operation bindings.
    pub fn empty(parser: impl Into<String>, connect: impl Into<String>) -> Self {
        Self {
            parser: parser.into(),
            connect: connect.into(),
            operations: BTreeMap::new(),
        }
    }

    /// Bind (or rebind) an operation to a URL.
    pub fn bind(mut self, kind: OperationKind, url: impl Into<String>) -> Self {
        self.operations.insert(kind, url.into());
        self
    }

    /// Endpoint for an operation, if bound.
    pub fn operation(&self, kind: OperationKind) -> Option<&str> {
        self.operations.get(&kind).map(String::as_str)
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::from_base_url(DEFAULT_AUTOMATION_BASE_URL)
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Automation backend endpoints.
    pub endpoints: EndpointTable,

    /// Project key used when an intent does not name one.
    pub default_project_key: String,

    /// Upper bound for a single outbound call, in milliseconds.
    pub request_timeout_ms: u64,
}

impl OrchestratorConfig {
    /// Config pointing at `base_url` with default settings.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            endpoints: EndpointTable::from_base_url(base_url),
            ..Self::default()
        }
    }

    /// Set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the default project key.
    pub fn with_default_project_key(mut self, key: impl Into<String>) -> Self {
        self.default_project_key = key.into();
        self
    }

    /// Per-call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointTable::default(),
            default_project_key: "NT".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}
