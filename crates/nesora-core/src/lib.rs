//! # Nesora Core
//!
//! Core types and pure functions for the Nesora intent orchestrator.
//!
//! This crate provides the building blocks the orchestrator runs on:
//! - [`Intent`] - one requested ticket operation
//! - [`ExecutionContext`] - per-batch outcomes keyed by intent id
//! - [`AggregateReport`] - the result of running a batch
//! - [`normalize`] / [`build_payload`] / [`format_report`] - response
//!   shaping, derived payloads and markdown rendering
//! - [`NesoraError`] - error types

pub mod context;
pub mod error;
pub mod format;
pub mod intent;
pub mod normalize;
pub mod path;
pub mod payload;
pub mod report;
pub mod types;

// Re-exports for convenience
pub use context::{ContextEntry, ExecutionContext, FailureRecord};
pub use error::{NesoraError, Result};
pub use format::format_report;
pub use intent::{BuildInstruction, Intent, IntentBuilder};
pub use normalize::{attach_unified_items, normalize, unwrap};
pub use payload::build_payload;
pub use report::{AggregateReport, ExecutionResult, ReportMeta};
pub use types::*;

/// Shorten `input` for log output.
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::context::ExecutionContext;
    pub use crate::error::{NesoraError, Result};
    pub use crate::intent::{BuildInstruction, Intent};
    pub use crate::report::{AggregateReport, ExecutionResult};
    pub use crate::types::{BatchStatus, OperationKind, ResultStatus};
}
