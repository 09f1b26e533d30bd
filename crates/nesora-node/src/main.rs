//! # Nesora Node
//!
//! API server for the Nesora Jira execution assistant.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use nesora_orchestrator::{
    EndpointTable, HttpTransport, OrchestratorConfig, DEFAULT_AUTOMATION_BASE_URL,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod assistant;
mod error;
mod parser;
mod state;

use assistant::{AssistantConfig, DEFAULT_GATEWAY_URL, DEFAULT_MODEL};
use state::AppState;

/// Command-line and environment configuration.
#[derive(Debug, Parser)]
#[command(name = "nesora-node", version, about = "Nesora Jira execution assistant API")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "NESORA_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Base URL of the automation backend hosting the webhook workflows.
    #[arg(long, env = "AUTOMATION_BASE_URL", default_value = DEFAULT_AUTOMATION_BASE_URL)]
    automation_base_url: String,

    /// OpenAI-compatible chat completions URL.
    #[arg(long, env = "AI_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    ai_gateway_url: String,

    #[arg(long, env = "AI_GATEWAY_API_KEY", hide_env_values = true)]
    ai_gateway_api_key: Option<String>,

    #[arg(long, env = "AI_MODEL", default_value = DEFAULT_MODEL)]
    ai_model: String,

    /// Upper bound for one outbound call, in milliseconds.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// Project key for intents that do not name one.
    #[arg(long, env = "DEFAULT_PROJECT_KEY", default_value = "NT")]
    default_project_key: String,
}

impl Args {
    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            endpoints: EndpointTable::from_base_url(&self.automation_base_url),
            ..OrchestratorConfig::default()
        }
        .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
        .with_default_project_key(&self.default_project_key)
    }

    fn assistant_config(&self) -> AssistantConfig {
        AssistantConfig {
            gateway_url: self.ai_gateway_url.clone(),
            api_key: self.ai_gateway_api_key.clone(),
            model: self.ai_model.clone(),
        }
    }
}

/// Run the Nesora node server.
async fn run_server(args: Args) -> anyhow::Result<()> {
    info!("🚀 Nesora Node starting...");

    let config = args.orchestrator_config();
    info!(
        automation = %args.automation_base_url,
        timeout_ms = config.request_timeout_ms,
        project_key = %config.default_project_key,
        "🔧 Automation backend configured"
    );
    if args.ai_gateway_api_key.is_none() {
        warn!("AI_GATEWAY_API_KEY is not set; /api/v1/chat will fail");
    }

    let transport = HttpTransport::new(config.request_timeout())
        .context("failed to build HTTP transport")?;
    let state = AppState::new(config, args.assistant_config(), Arc::new(transport));

    let app = create_router(state);

    info!("🌐 Listening on http://{}", args.bind);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    axum::serve(listener, app)
        .await
        .context("server terminated with error")?;

    Ok(())
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/api/v1/chat", post(api::chat::chat))
        .route("/api/v1/intents/execute", post(api::execute::execute_intents))
        .route("/api/v1/connect", post(api::connect::connect_jira))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    run_server(Args::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["nesora-node"]).unwrap();
        assert_eq!(args.bind, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(args.ai_model, DEFAULT_MODEL);

        let config = args.orchestrator_config();
        assert_eq!(config.default_project_key, "NT");
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.endpoints.parser, "http://localhost:5678/webhook/mcp/parser");
    }

    #[test]
    fn test_args_flags() {
        let args = Args::try_parse_from([
            "nesora-node",
            "--automation-base-url",
            "https://flows.acme.io",
            "--request-timeout-ms",
            "5000",
            "--default-project-key",
            "OPS",
            "--ai-gateway-api-key",
            "k",
        ])
        .unwrap();

        let config = args.orchestrator_config();
        assert_eq!(config.endpoints.connect, "https://flows.acme.io/webhook/mcp/connect");
        assert_eq!(config.request_timeout_ms, 5_000);
        assert_eq!(config.default_project_key, "OPS");
        assert_eq!(args.assistant_config().api_key.as_deref(), Some("k"));
    }
}
