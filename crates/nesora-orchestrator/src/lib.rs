//! # Nesora Orchestrator
//!
//! Runs batches of Jira intents against the automation backend.
//!
//! Intents run in dependency waves: everything whose dependencies are done
//! runs concurrently, outcomes land in a shared [`nesora_core::ExecutionContext`],
//! and later intents can derive their payloads from earlier outcomes.

pub mod config;
pub mod executor;
pub mod scheduler;
pub mod transport;

pub use config::{EndpointTable, OrchestratorConfig, DEFAULT_AUTOMATION_BASE_URL};
pub use executor::{Actor, IntentExecutor};
pub use scheduler::Orchestrator;
pub use transport::{decode_body, HttpTransport, OutboundRequest, Transport};

#[cfg(any(test, feature = "testing"))]
pub use transport::{CallPhase, ScriptedReply, ScriptedTransport, TransportEvent};
