//! Execution results and the aggregate batch report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::types::{BatchStatus, ResultStatus};

/// Outcome of one executed intent. Immutable once appended to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Intent id.
    pub id: String,

    /// Operation name as requested.
    #[serde(alias = "intent")]
    pub name: String,

    /// Success or error.
    pub status: ResultStatus,

    /// Unwrapped response body (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error message (error only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful result carrying `data`.
    pub fn success(id: impl Into<String>, name: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: ResultStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    /// A failed result carrying `error`.
    pub fn failure(id: impl Into<String>, name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: ResultStatus::Error,
            data: None,
            error: Some(error.to_string()),
        }
    }

    /// Returns true if the intent succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// Metadata attached to every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Unique id of this batch run.
    pub batch_id: Uuid,

    /// When the batch finished.
    pub timestamp: DateTime<Utc>,

    /// Wall-clock duration of the batch.
    pub duration_ms: u64,
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub status: BatchStatus,

    /// Intents that reached the done set (attempted or rejected as unknown).
    pub intents_executed: usize,

    /// Per-intent results, in settle order within each wave.
    pub results: Vec<ExecutionResult>,

    /// Final context, keyed by intent id.
    pub context: ExecutionContext,

    pub meta: ReportMeta,
}

impl AggregateReport {
    /// Assemble a report; `status` is derived from `results`.
    pub fn new(
        intents_executed: usize,
        results: Vec<ExecutionResult>,
        context: ExecutionContext,
        duration_ms: u64,
    ) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let error_count = results.len() - success_count;

        Self {
            status: BatchStatus::from_counts(success_count, error_count),
            intents_executed,
            results,
            context,
            meta: ReportMeta {
                batch_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                duration_ms,
            },
        }
    }

    /// Number of successful results.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed results.
    pub fn error_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}
