//! Derived payloads built from earlier intents' results.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::intent::BuildInstruction;
use crate::normalize::normalize;
use crate::path;

/// Prefix marking a context path in `build.from`.
pub const CONTEXT_SENTINEL: &str = "$ctx.";

/// Prefix marking an item path in a mapping template.
pub const ITEM_SENTINEL: &str = "$it.";

const ARRAY_MARKER: &str = "[]";

/// Apply `instruction` to `base`, reading source items from `context`.
///
/// Never fails: a missing `from`/`map`, or a template that is not an object,
/// returns `base` unchanged. Fields of `base` not named by the map survive.
pub fn build_payload(
    instruction: &BuildInstruction,
    context: &ExecutionContext,
    base: Map<String, Value>,
) -> Map<String, Value> {
    let (Some(from), Some(map)) = (instruction.from.as_deref(), instruction.map.as_ref()) else {
        warn!("build instruction without from/map, keeping base payload");
        return base;
    };

    let Some((target_key, template)) = map.iter().next() else {
        warn!("build instruction has an empty map, keeping base payload");
        return base;
    };
    let Some(template) = template.as_object() else {
        warn!(target = %target_key, "build template is not an object, keeping base payload");
        return base;
    };
    let target = target_key.strip_suffix(ARRAY_MARKER).unwrap_or(target_key);

    let from_path = from.strip_prefix(CONTEXT_SENTINEL).unwrap_or(from);
    debug!(path = %from_path, "building payload from context");

    let mut source = resolve_source(context, from_path);
    debug!(items = source.len(), "resolved source items");

    if let Some(filter) = &instruction.filter {
        source.retain(|item| matches_filter(item, filter));
        debug!(items = source.len(), "source items after filter");
    }

    let mapped: Vec<Value> = source
        .iter()
        .map(|item| Value::Object(apply_template(template, item)))
        .collect();

    debug!(target = %target, count = mapped.len(), "built payload array");

    let mut payload = base;
    payload.insert(target.to_string(), Value::Array(mapped));
    payload
}

/// Find the source array for `from_path`, trying known shape substitutions
/// before falling back to the normalized items of the whole entry.
fn resolve_source(context: &ExecutionContext, from_path: &str) -> Vec<Value> {
    for candidate in candidate_paths(from_path) {
        if let Some(Value::Array(items)) = context.resolve(&candidate) {
            return items;
        }
    }

    let entry_id = from_path.split('.').next().unwrap_or(from_path);
    match context.get(entry_id) {
        Some(entry) => normalize(&entry.view()),
        None => {
            warn!(path = %from_path, "build source not found in context");
            Vec::new()
        }
    }
}

fn candidate_paths(from_path: &str) -> Vec<String> {
    let mut candidates = vec![from_path.to_string()];

    if let Some(prefix) = from_path.strip_suffix(".data.issues") {
        candidates.push(format!("{prefix}.data.fetched"));
    }
    if let Some(prefix) = from_path.strip_suffix(".data.fetched") {
        candidates.push(format!("{prefix}.data.issues"));
    }
    if let Some(pos) = from_path.find(".data.") {
        candidates.push(format!("{}.data.items", &from_path[..pos]));
    }
    candidates.push(format!("{from_path}.data.items"));

    candidates
}

/// Every `path -> expected` pair must hold on `item`.
fn matches_filter(item: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        path::resolve(item, key).is_some_and(|actual| values_equal(actual, expected))
    })
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn apply_template(template: &Map<String, Value>, item: &Value) -> Map<String, Value> {
    let mut mapped = Map::new();
    for (field, template_value) in template {
        match template_value.as_str().and_then(|s| s.strip_prefix(ITEM_SENTINEL)) {
            Some(item_path) => {
                if let Some(value) = path::resolve(item, item_path) {
                    mapped.insert(field.clone(), value.clone());
                }
            }
            None => {
                mapped.insert(field.clone(), template_value.clone());
            }
        }
    }
    mapped
}
