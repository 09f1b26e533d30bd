//! Health check endpoint.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "nesora-node".to_string(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum_test::TestServer;
    use nesora_orchestrator::ScriptedTransport;
    use serde_json::Value;

    use crate::api::test_support::test_state;

    #[tokio::test]
    async fn test_health() {
        let state = test_state(Arc::new(ScriptedTransport::new()));
        let server = TestServer::new(crate::create_router(state)).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "nesora-node");
        assert!(body["timestamp"].is_string());
    }
}
