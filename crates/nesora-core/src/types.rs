//! Common types used across Nesora.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NesoraError;

/// Ticket operations the automation backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create one or more tickets.
    #[serde(alias = "create")]
    CreateTicket,
    /// Search / fetch tickets.
    #[serde(alias = "fetch")]
    FetchTicket,
    /// Update ticket fields or transition status.
    #[serde(alias = "update")]
    UpdateTicket,
    /// Add comments to tickets.
    #[serde(alias = "comment")]
    CommentTicket,
    /// Delete tickets.
    #[serde(alias = "delete")]
    DeleteTicket,
}

impl OperationKind {
    /// All operation kinds, in declaration order.
    pub const ALL: [OperationKind; 5] = [
        OperationKind::CreateTicket,
        OperationKind::FetchTicket,
        OperationKind::UpdateTicket,
        OperationKind::CommentTicket,
        OperationKind::DeleteTicket,
    ];

    /// Canonical wire name (e.g. `fetch_ticket`).
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateTicket => "create_ticket",
            OperationKind::FetchTicket => "fetch_ticket",
            OperationKind::UpdateTicket => "update_ticket",
            OperationKind::CommentTicket => "comment_ticket",
            OperationKind::DeleteTicket => "delete_ticket",
        }
    }

    /// Webhook path segment on the automation backend.
    pub fn webhook_segment(&self) -> &'static str {
        match self {
            OperationKind::CreateTicket => "create",
            OperationKind::FetchTicket => "fetch",
            OperationKind::UpdateTicket => "update",
            OperationKind::CommentTicket => "comment",
            OperationKind::DeleteTicket => "delete",
        }
    }

    /// Parse a wire name or its short alias. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.webhook_segment() == name)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = NesoraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| NesoraError::UnknownOperation {
            name: s.to_string(),
        })
    }
}

/// Outcome of a single intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Overall outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// No intent failed.
    Success,
    /// Some intents succeeded and some failed.
    Partial,
    /// Every recorded intent failed.
    Failed,
}

impl BatchStatus {
    /// Derive the batch status from success / error counts.
    pub fn from_counts(success_count: usize, error_count: usize) -> Self {
        if error_count == 0 {
            BatchStatus::Success
        } else if success_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }
}
