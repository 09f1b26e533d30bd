//! Per-batch execution context.
//!
//! Maps intent ids to their outcome. Entries are write-once and the context
//! lives for exactly one batch run.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::path;
use crate::report::ExecutionResult;
use crate::types::ResultStatus;

/// Error descriptor stored for a failed intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub intent: String,
    pub id: String,
    pub status: ResultStatus,
    pub error: String,
}

/// Outcome of one intent as seen by later intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextEntry {
    /// The intent failed; its error descriptor.
    Failed(FailureRecord),
    /// The intent succeeded; its unwrapped response.
    Completed(Value),
}

impl ContextEntry {
    /// JSON view used by path lookups.
    pub fn view(&self) -> Cow<'_, Value> {
        match self {
            ContextEntry::Completed(data) => Cow::Borrowed(data),
            ContextEntry::Failed(record) => {
                Cow::Owned(serde_json::to_value(record).unwrap_or(Value::Null))
            }
        }
    }

    /// Returns true if the intent succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ContextEntry::Completed(_))
    }
}

/// Mapping from intent id to outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    entries: BTreeMap<String, ContextEntry>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of `result`. Returns false if the id was already set.
    pub fn record(&mut self, result: &ExecutionResult) -> bool {
        let entry = match result.status {
            ResultStatus::Success => {
                ContextEntry::Completed(result.data.clone().unwrap_or(Value::Null))
            }
            ResultStatus::Error => ContextEntry::Failed(FailureRecord {
                intent: result.name.clone(),
                id: result.id.clone(),
                status: ResultStatus::Error,
                error: result.error.clone().unwrap_or_default(),
            }),
        };
        self.insert(result.id.clone(), entry)
    }

    /// Insert an entry. Existing entries are never overwritten.
    pub fn insert(&mut self, id: String, entry: ContextEntry) -> bool {
        if self.entries.contains_key(&id) {
            warn!(intent_id = %id, "context entry already written, ignoring second write");
            return false;
        }
        self.entries.insert(id, entry);
        true
    }

    /// Get the entry for an id.
    pub fn get(&self, id: &str) -> Option<&ContextEntry> {
        self.entries.get(id)
    }

    /// Returns true if an entry exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Resolve `id.rest.of.path`; the first segment selects the entry.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let (id, rest) = match path.split_once('.') {
            Some((id, rest)) => (id, Some(rest)),
            None => (path, None),
        };
        let view = self.get(id)?.view();
        match rest {
            None => Some(view.into_owned()),
            Some(rest) => path::resolve(&view, rest).cloned(),
        }
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextEntry)> {
        self.entries.iter()
    }
}
