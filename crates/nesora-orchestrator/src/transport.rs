//! Outbound HTTP seam.
//!
//! Every call to the automation backend or the LLM gateway goes through
//! [`Transport`]: a JSON `POST` that yields the decoded response body, or a
//! [`NesoraError`] for non-2xx statuses and transport failures.

use std::time::Duration;

use async_trait::async_trait;
use nesora_core::{NesoraError, Result};
use serde_json::Value;

/// A JSON POST request.
#[derive(Debug, Clone, Copy)]
pub struct OutboundRequest<'a> {
    pub url: &'a str,
    pub body: &'a Value,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<&'a str>,
}

impl<'a> OutboundRequest<'a> {
    /// Unauthenticated request.
    pub fn new(url: &'a str, body: &'a Value) -> Self {
        Self {
            url,
            body,
            bearer_token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_bearer(mut self, token: &'a str) -> Self {
        self.bearer_token = Some(token);
        self
    }
}

/// Trait for outbound JSON calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `request.body` to `request.url` and decode the JSON response.
    ///
    /// An empty 2xx body decodes to `null`. Non-2xx responses map to
    /// [`NesoraError::Http`] with the status, reason and body text.
    async fn post_json(&self, request: OutboundRequest<'_>) -> Result<Value>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport whose calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NesoraError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> NesoraError {
        if err.is_timeout() {
            NesoraError::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            NesoraError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: OutboundRequest<'_>) -> Result<Value> {
        let mut builder = self.client.post(request.url).json(request.body);
        if let Some(token) = request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NesoraError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| self.map_error(e))?;
        decode_body(&text)
    }
}

/// Decode a response body; blank bodies become `null`.
pub fn decode_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(any(test, feature = "testing"))]
pub use scripted::{CallPhase, ScriptedReply, ScriptedTransport, TransportEvent};

#[cfg(any(test, feature = "testing"))]
mod scripted {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use nesora_core::{NesoraError, Result};
    use serde_json::Value;

    use super::{OutboundRequest, Transport};

    /// Canned reply for a URL.
    #[derive(Debug, Clone)]
    pub enum ScriptedReply {
        /// 2xx with this JSON body.
        Json(Value),
        /// Non-2xx with this status and body text.
        Status(u16, String),
        /// Connection-level failure.
        Fail(String),
    }

    /// Whether an event marks the start or the end of a call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CallPhase {
        Started,
        Finished,
    }

    /// One entry of the call log.
    #[derive(Debug, Clone)]
    pub struct TransportEvent {
        pub url: String,
        pub phase: CallPhase,
        pub body: Value,
        pub bearer_token: Option<String>,
    }

    #[derive(Default)]
    struct Route {
        queued: VecDeque<ScriptedReply>,
        fallback: Option<ScriptedReply>,
        delay: Duration,
    }

    /// In-memory [`Transport`] that answers from a script and logs calls.
    ///
    /// Unscripted URLs answer 404.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<HashMap<String, Route>>,
        events: Mutex<Vec<TransportEvent>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Always answer `url` with `reply`.
        pub fn on(self, url: impl Into<String>, reply: ScriptedReply) -> Self {
            self.with_route(url, |route| route.fallback = Some(reply));
            self
        }

        /// Answer the next call to `url` with `reply` (before the fallback).
        pub fn once(self, url: impl Into<String>, reply: ScriptedReply) -> Self {
            self.with_route(url, |route| route.queued.push_back(reply));
            self
        }

        /// Delay every answer for `url`.
        pub fn delay(self, url: impl Into<String>, delay: Duration) -> Self {
            self.with_route(url, |route| route.delay = delay);
            self
        }

        /// Snapshot of the call log.
        pub fn events(&self) -> Vec<TransportEvent> {
            self.events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }

        /// Bodies of every call made to `url`, in start order.
        pub fn bodies_for(&self, url: &str) -> Vec<Value> {
            self.events()
                .into_iter()
                .filter(|e| e.url == url && e.phase == CallPhase::Started)
                .map(|e| e.body)
                .collect()
        }

        /// Position of the first `phase` event for `url` in the log.
        pub fn position(&self, url: &str, phase: CallPhase) -> Option<usize> {
            self.events()
                .iter()
                .position(|e| e.url == url && e.phase == phase)
        }

        /// Number of calls started.
        pub fn call_count(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| e.phase == CallPhase::Started)
                .count()
        }

        fn with_route(&self, url: impl Into<String>, f: impl FnOnce(&mut Route)) {
            let mut routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
            f(routes.entry(url.into()).or_default());
        }

        fn log(&self, request: &OutboundRequest<'_>, phase: CallPhase) {
            self.events
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(TransportEvent {
                    url: request.url.to_string(),
                    phase,
                    body: request.body.clone(),
                    bearer_token: request.bearer_token.map(str::to_string),
                });
        }

        fn next_reply(&self, url: &str) -> (ScriptedReply, Duration) {
            let mut routes = self.routes.lock().unwrap_or_else(|p| p.into_inner());
            match routes.get_mut(url) {
                Some(route) => {
                    let reply = route
                        .queued
                        .pop_front()
                        .or_else(|| route.fallback.clone())
                        .unwrap_or_else(not_found);
                    (reply, route.delay)
                }
                None => (not_found(), Duration::ZERO),
            }
        }
    }

    fn not_found() -> ScriptedReply {
        ScriptedReply::Status(404, "no route".to_string())
    }

    fn reason(status: u16) -> &'static str {
        match status {
            400 => "Bad Request",
            402 => "Payment Required",
            404 => "Not Found",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "",
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_json(&self, request: OutboundRequest<'_>) -> Result<Value> {
            self.log(&request, CallPhase::Started);
            let (reply, delay) = self.next_reply(request.url);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.log(&request, CallPhase::Finished);

            match reply {
                ScriptedReply::Json(body) => Ok(body),
                ScriptedReply::Status(status, body) => Err(NesoraError::Http {
                    status,
                    reason: reason(status).to_string(),
                    body,
                }),
                ScriptedReply::Fail(message) => Err(NesoraError::Transport(message)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("").unwrap(), Value::Null);
        assert_eq!(decode_body("  \n").unwrap(), Value::Null);
        assert_eq!(decode_body("{\"ok\":true}").unwrap(), json!({"ok": true}));
        assert!(matches!(decode_body("<html>"), Err(NesoraError::Decode(_))));
    }

    #[tokio::test]
    async fn test_scripted_transport_queue_then_fallback() {
        let transport = ScriptedTransport::new()
            .once("http://x/a", ScriptedReply::Json(json!({"n": 1})))
            .on("http://x/a", ScriptedReply::Json(json!({"n": 2})));
        let body = json!({});

        let first = transport.post_json(OutboundRequest::new("http://x/a", &body)).await.unwrap();
        let second = transport.post_json(OutboundRequest::new("http://x/a", &body)).await.unwrap();
        let missing = transport.post_json(OutboundRequest::new("http://x/b", &body)).await;

        assert_eq!(first, json!({"n": 1}));
        assert_eq!(second, json!({"n": 2}));
        assert!(matches!(missing, Err(NesoraError::Http { status: 404, .. })));
        assert_eq!(transport.call_count(), 3);
    }

    async fn spawn_backend() -> String {
        use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};

        let app = Router::new()
            .route(
                "/down",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route("/empty", post(|| async { StatusCode::OK }))
            .route(
                "/echo",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    Json(json!({"authorization": auth, "body": body}))
                }),
            )
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_transport_against_live_backend() {
        let base = spawn_backend().await;
        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let body = json!({"user_id": "user-1"});

        let down = transport
            .post_json(OutboundRequest::new(&format!("{base}/down"), &body))
            .await
            .unwrap_err();
        match down {
            NesoraError::Http { status, reason, body } => {
                assert_eq!(status, 503);
                assert_eq!(reason, "Service Unavailable");
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }

        let empty = transport
            .post_json(OutboundRequest::new(&format!("{base}/empty"), &body))
            .await
            .unwrap();
        assert_eq!(empty, Value::Null);

        let echo_url = format!("{base}/echo");
        let echoed = transport
            .post_json(OutboundRequest::new(&echo_url, &body).with_bearer("sk-test"))
            .await
            .unwrap();
        assert_eq!(echoed["authorization"], "Bearer sk-test");
        assert_eq!(echoed["body"], body);

        let anonymous = transport
            .post_json(OutboundRequest::new(&echo_url, &body))
            .await
            .unwrap();
        assert_eq!(anonymous["authorization"], Value::Null);
    }

    #[tokio::test]
    async fn test_http_transport_timeout() {
        let base = spawn_backend().await;
        let transport = HttpTransport::new(Duration::from_millis(100)).unwrap();

        let err = transport
            .post_json(OutboundRequest::new(&format!("{base}/slow"), &json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, NesoraError::Timeout { duration_ms: 100 }));
        assert_eq!(err.to_string(), "Request timed out after 100ms");
    }
}
