//! Markdown rendering of aggregate reports for the chat transcript.

use std::fmt::Write;

use serde_json::Value;

use crate::normalize::normalize;
use crate::path::resolve_present;
use crate::report::{AggregateReport, ExecutionResult};
use crate::types::{BatchStatus, OperationKind};

const SUMMARY_WIDTH: usize = 60;
const NEUTRAL_LINE: &str = "✅ Your request has been processed successfully.";

/// Render `report` as markdown. Never fails; missing data degrades to
/// generic lines.
pub fn format_report(report: &AggregateReport) -> String {
    if report.results.is_empty() {
        return NEUTRAL_LINE.to_string();
    }

    let mut out = String::new();
    let n = report.intents_executed;
    match report.status {
        BatchStatus::Success => {
            let _ = writeln!(out, "✅ **All {n} operations completed successfully**\n");
        }
        BatchStatus::Partial => {
            let _ = writeln!(out, "⚠️ **{n} operations completed with some errors**\n");
        }
        BatchStatus::Failed => out.push_str("❌ **Operations failed**\n\n"),
    }

    for result in &report.results {
        render_result(&mut out, result);
    }

    out
}

fn render_result(out: &mut String, result: &ExecutionResult) {
    if !result.is_success() {
        let error = result.error.as_deref().unwrap_or("unknown error");
        let _ = writeln!(out, "❌ **{}** failed: {}\n", result.name, error);
        return;
    }

    let empty = Value::Null;
    let data = result.data.as_ref().unwrap_or(&empty);
    let items = normalize(data);

    match OperationKind::parse(&result.name) {
        Some(OperationKind::CreateTicket) => {
            let created = first_list(data, &["created"]).unwrap_or(items);
            if created.is_empty() {
                out.push_str("### ✅ Tickets Created Successfully\n\n");
            } else {
                out.push_str("### ✅ Created Tickets\n\n");
                for ticket in &created {
                    let summary = text_at(ticket, &["summary", "fields.summary"]);
                    match summary {
                        Some(summary) => {
                            let _ = writeln!(out, "- **`{}`** - {}", ticket_key(ticket), summary);
                        }
                        None => {
                            let _ = writeln!(out, "- **`{}`**", ticket_key(ticket));
                        }
                    }
                }
                out.push('\n');
            }
        }
        Some(OperationKind::FetchTicket) => render_fetch(out, &items),
        Some(OperationKind::UpdateTicket) => {
            let updated = first_list(data, &["updated", "updated_tickets"]).unwrap_or(items);
            render_key_list(
                out,
                &updated,
                "✏️ Updated",
                "Ticket",
                " updated",
                "### ✏️ Tickets Updated Successfully",
            );
        }
        Some(OperationKind::CommentTicket) => {
            let commented = first_list(data, &["commented", "comments"]).unwrap_or(items);
            render_key_list(
                out,
                &commented,
                "💬 Added",
                "Comment",
                "",
                "### 💬 Comments Added Successfully",
            );
        }
        Some(OperationKind::DeleteTicket) => {
            let deleted = first_list(data, &["deleted"]).unwrap_or(items);
            render_key_list(
                out,
                &deleted,
                "🗑️ Deleted",
                "Ticket",
                "",
                "### 🗑️ Tickets Deleted Successfully",
            );
        }
        None => match data.get("message").and_then(Value::as_str) {
            Some(message) => {
                let _ = writeln!(out, "{message}\n");
            }
            None => {
                let _ = writeln!(out, "✅ {} completed\n", result.name);
            }
        },
    }
}

fn render_fetch(out: &mut String, items: &[Value]) {
    let _ = writeln!(out, "### 📋 Fetched {} {}\n", items.len(), plural("Ticket", items.len()));
    if items.is_empty() {
        out.push_str("No tickets found.\n\n");
        return;
    }

    out.push_str("| Key | Summary | Status | Assignee |\n|-----|---------|--------|----------|\n");
    for ticket in items {
        let key = text_at(ticket, &["key"]).unwrap_or_else(|| "N/A".to_string());
        let summary = text_at(ticket, &["summary", "fields.summary"])
            .unwrap_or_else(|| "No summary".to_string());
        let status = text_at(ticket, &["status", "fields.status.name"])
            .unwrap_or_else(|| "Unknown".to_string());
        let assignee = text_at(
            ticket,
            &["assignee", "fields.assignee.displayName", "fields.assignee.emailAddress"],
        )
        .unwrap_or_else(|| "Unassigned".to_string());

        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} |",
            key,
            truncate_chars(&summary, SUMMARY_WIDTH),
            status,
            assignee
        );
    }
    out.push('\n');
}

fn render_key_list(
    out: &mut String,
    tickets: &[Value],
    verb: &str,
    noun: &str,
    suffix: &str,
    fallback_heading: &str,
) {
    if tickets.is_empty() {
        let _ = writeln!(out, "{fallback_heading}\n");
        return;
    }

    let _ = writeln!(out, "### {verb} {} {}\n", tickets.len(), plural(noun, tickets.len()));
    for ticket in tickets {
        let _ = writeln!(out, "- **`{}`**{}", ticket_key(ticket), suffix);
    }
    out.push('\n');
}

/// First of `keys` on `data` that holds an array.
fn first_list(data: &Value, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array).cloned())
}

/// Display key of a ticket: a bare string, else `key`, else `id`.
fn ticket_key(ticket: &Value) -> String {
    match ticket {
        Value::String(key) => key.clone(),
        _ => text_at(ticket, &["key", "id"]).unwrap_or_else(|| "Unknown".to_string()),
    }
}

/// First non-empty text found at any of `paths`.
fn text_at(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| resolve_present(value, p))
        .find_map(display_text)
}

fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get("name").and_then(display_text),
        _ => None,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn plural(noun: &str, count: usize) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}
