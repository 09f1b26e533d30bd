//! Dotted-path lookups into JSON values.

use serde_json::Value;

/// Resolve `a.b.0.c` against `root`.
///
/// Objects are walked by key and arrays by numeric index. Returns `None` as
/// soon as a segment is missing or an intermediate is a scalar. The root
/// itself must be an object or array.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if !is_indexable(root) {
        return None;
    }

    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Like [`resolve`], but treats an explicit `null` as missing.
pub fn resolve_present<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    resolve(root, path).filter(|v| !v.is_null())
}

fn is_indexable(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
