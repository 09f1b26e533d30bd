//! Normalization of automation-backend responses.
//!
//! Webhook responses arrive in several shapes: the `[{ "json": ... }]`
//! envelope, bare arrays, or objects that keep their rows under one of a
//! handful of collection keys (optionally nested under `data`). Everything
//! here is total: unknown shapes degrade to an empty list.

use serde_json::{Map, Value};

/// Collection keys checked, in precedence order, when looking for items.
pub const COLLECTION_KEYS: [&str; 7] = [
    "items", "tickets", "fetched", "issues", "created", "updated", "deleted",
];

const ENVELOPE_KEY: &str = "json";

/// Convert any response shape into an ordered list of items.
///
/// Precedence:
/// 1. array of `{json: ...}` envelopes: unwrap each, expand an inner array
///    or collection (or keep it as a single item), flatten;
/// 2. bare array: passed through;
/// 3. `{json: ...}` object: the inner value is normalized instead;
/// 4. object with a top-level collection key ([`COLLECTION_KEYS`] order);
/// 5. object whose `data` holds a collection key;
/// 6. anything else: empty.
pub fn normalize(raw: &Value) -> Vec<Value> {
    match raw {
        Value::Array(elements) if is_envelope_array(elements) => elements
            .iter()
            .flat_map(|element| {
                let inner = open_envelope(element);
                match (inner, collection_of(inner)) {
                    (Value::Array(rows), _) => rows.clone(),
                    (_, Some(items)) => items.clone(),
                    (_, None) => vec![inner.clone()],
                }
            })
            .collect(),
        Value::Array(elements) => elements.clone(),
        Value::Object(map) => match map.get(ENVELOPE_KEY) {
            Some(inner) => normalize(inner),
            None => collection_of(raw).cloned().unwrap_or_default(),
        },
        _ => Vec::new(),
    }
}

/// Collapse the `{json: ...}` / `[{json: ...}, ...]` envelope convention.
///
/// Returns the single inner value, or `{items: [...]}` when the array holds
/// several elements. Non-envelope values pass through unchanged, except that
/// arrays are always turned into an object (or their single element).
pub fn unwrap(raw: &Value) -> Value {
    match raw {
        Value::Array(elements) if elements.is_empty() => items_object(Vec::new()),
        Value::Array(elements) => {
            let extracted: Vec<Value> = if is_envelope_array(elements) {
                elements.iter().map(|e| open_envelope(e).clone()).collect()
            } else {
                elements.clone()
            };
            if extracted.len() == 1 {
                extracted.into_iter().next().unwrap_or(Value::Null)
            } else {
                items_object(extracted)
            }
        }
        Value::Object(map) => match map.get(ENVELOPE_KEY) {
            Some(inner) => inner.clone(),
            None => raw.clone(),
        },
        other => other.clone(),
    }
}

/// Expose the normalized items of `result` at `result.data.items`.
///
/// Only objects are touched. A missing `data` field is created; a `data`
/// field that is not an object is left alone.
pub fn attach_unified_items(result: &mut Value) {
    let items = normalize(result);
    let Value::Object(map) = result else {
        return;
    };

    let data = map
        .entry("data")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(data) = data {
        data.insert("items".to_string(), Value::Array(items));
    }
}

/// First collection found on `value` itself, then under `value.data`.
fn collection_of(value: &Value) -> Option<&Vec<Value>> {
    top_level_collection(value).or_else(|| value.get("data").and_then(top_level_collection))
}

fn top_level_collection(value: &Value) -> Option<&Vec<Value>> {
    let map = value.as_object()?;
    COLLECTION_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
}

fn is_envelope_array(elements: &[Value]) -> bool {
    elements
        .first()
        .and_then(Value::as_object)
        .is_some_and(|first| first.contains_key(ENVELOPE_KEY))
}

fn open_envelope(element: &Value) -> &Value {
    match element.get(ENVELOPE_KEY) {
        Some(inner) if !inner.is_null() => inner,
        _ => element,
    }
}

fn items_object(items: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("items".to_string(), Value::Array(items));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_with_collection() {
        let raw = json!([{"json": {"tickets": [{"key": "NT-1"}, {"key": "NT-2"}]}}]);
        assert_eq!(normalize(&raw), vec![json!({"key": "NT-1"}), json!({"key": "NT-2"})]);
    }

    #[test]
    fn test_envelope_rows_flatten() {
        let raw = json!([{"json": {"key": "NT-1"}}, {"json": {"key": "NT-2"}}]);
        assert_eq!(normalize(&raw), vec![json!({"key": "NT-1"}), json!({"key": "NT-2"})]);

        let nested = json!([{"json": [{"key": "A-1"}, {"key": "A-2"}]}, {"json": {"key": "A-3"}}]);
        assert_eq!(
            normalize(&nested),
            vec![json!({"key": "A-1"}), json!({"key": "A-2"}), json!({"key": "A-3"})]
        );
    }

    #[test]
    fn test_bare_array_passes_through() {
        let raw = json!([{"key": "NT-1"}]);
        assert_eq!(normalize(&raw), vec![json!({"key": "NT-1"})]);
    }

    #[test]
    fn test_collection_precedence() {
        let raw = json!({"issues": [1], "items": [2], "data": {"items": [3]}});
        assert_eq!(normalize(&raw), vec![json!(2)]);

        let nested = json!({"status": "ok", "data": {"fetched": [{"key": "A-1"}]}});
        assert_eq!(normalize(&nested), vec![json!({"key": "A-1"})]);
    }

    #[test]
    fn test_non_array_collection_is_skipped() {
        let raw = json!({"items": "none", "created": [{"key": "NT-9"}]});
        assert_eq!(normalize(&raw), vec![json!({"key": "NT-9"})]);
    }

    #[test]
    fn test_unknown_shapes_are_empty() {
        assert!(normalize(&json!({})).is_empty());
        assert!(normalize(&Value::Null).is_empty());
        assert!(normalize(&json!("ok")).is_empty());
        assert!(normalize(&json!({"message": "done"})).is_empty());
    }

    #[test]
    fn test_unwrap_shapes() {
        assert_eq!(unwrap(&json!([{"json": {"a": 1}}])), json!({"a": 1}));
        assert_eq!(
            unwrap(&json!([{"json": {"a": 1}}, {"json": {"a": 2}}])),
            json!({"items": [{"a": 1}, {"a": 2}]})
        );
        assert_eq!(unwrap(&json!({"json": {"b": 2}})), json!({"b": 2}));
        assert_eq!(unwrap(&json!([])), json!({"items": []}));
        assert_eq!(unwrap(&json!([1, 2])), json!({"items": [1, 2]}));
        assert_eq!(unwrap(&json!({"c": 3})), json!({"c": 3}));
        assert_eq!(unwrap(&Value::Null), Value::Null);
    }

    #[test]
    fn test_attach_unified_items() {
        let mut result = json!({"fetched": [{"key": "NT-3"}], "data": {"total": 1}});
        attach_unified_items(&mut result);
        assert_eq!(result["data"]["items"], json!([{"key": "NT-3"}]));
        assert_eq!(result["data"]["total"], json!(1));

        let mut bare = json!({"message": "ok"});
        attach_unified_items(&mut bare);
        assert_eq!(bare["data"]["items"], json!([]));

        let mut scalar = json!("ok");
        attach_unified_items(&mut scalar);
        assert_eq!(scalar, json!("ok"));
    }
}
