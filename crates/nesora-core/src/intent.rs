//! Intent types and builder.
//!
//! An Intent is one requested ticket operation, as produced by the
//! natural-language parser. Intents in one batch may depend on each other and
//! may derive array-valued payload fields from an earlier intent's output.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::OperationKind;

/// A single requested operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntentWire")]
pub struct Intent {
    /// Identifier, unique within a batch. Falls back to `name` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Operation name (e.g. `fetch_ticket`).
    pub name: String,

    /// Ids that must be done (successfully or not) before this intent runs.
    pub depends_on: Vec<String>,

    /// Static request fields.
    pub payload: Map<String, Value>,

    /// Derived-payload instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInstruction>,
}

/// Inbound intent shape. Parser output may carry `intent` (the operation)
/// next to a free-text `name`, and `depends_on` next to `dependsOn`.
#[derive(Deserialize)]
struct IntentWire {
    #[serde(default)]
    id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    intent: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string_list")]
    depends_on: Vec<String>,

    #[serde(default, rename = "dependsOn", deserialize_with = "lenient_string_list")]
    depends_on_camel: Vec<String>,

    #[serde(default, deserialize_with = "lenient_object")]
    payload: Map<String, Value>,

    #[serde(default, deserialize_with = "lenient_build")]
    build: Option<BuildInstruction>,
}

impl TryFrom<IntentWire> for Intent {
    type Error = String;

    fn try_from(wire: IntentWire) -> Result<Self, Self::Error> {
        let name = wire
            .intent
            .or(wire.name)
            .ok_or_else(|| "intent is missing an operation (`intent` or `name`)".to_string())?;
        let depends_on = if wire.depends_on.is_empty() {
            wire.depends_on_camel
        } else {
            wire.depends_on
        };

        Ok(Self {
            id: wire.id,
            name,
            depends_on,
            payload: wire.payload,
            build: wire.build,
        })
    }
}

/// Declarative instruction deriving a payload array from a prior result.
///
/// ```json
/// { "from": "$ctx.fetch1.items",
///   "filter": { "status": "Open" },
///   "map": { "updates[]": { "key": "$it.key", "status": "Done" } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInstruction {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_optional_object")]
    pub filter: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_optional_object")]
    pub map: Option<Map<String, Value>>,
}

impl Intent {
    /// Create a new IntentBuilder.
    pub fn builder(name: impl Into<String>) -> IntentBuilder {
        IntentBuilder::new(name)
    }

    /// Effective id: the explicit id, or the operation name.
    pub fn id(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.name,
        }
    }

    /// Operation kind, if the name is one we know.
    pub fn operation(&self) -> Option<OperationKind> {
        OperationKind::parse(&self.name)
    }

    /// True when every dependency is satisfied by `is_done`.
    pub fn is_ready(&self, is_done: impl Fn(&str) -> bool) -> bool {
        self.depends_on.iter().all(|dep| is_done(dep))
    }
}

/// Builder for creating Intents with a fluent API.
#[derive(Debug)]
pub struct IntentBuilder {
    intent: Intent,
}

impl IntentBuilder {
    /// Start an intent for the given operation name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            intent: Intent {
                id: None,
                name: name.into(),
                depends_on: Vec::new(),
                payload: Map::new(),
                build: None,
            },
        }
    }

    /// Set an explicit id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.intent.id = Some(id.into());
        self
    }

    /// Add a dependency.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.intent.depends_on.push(id.into());
        self
    }

    /// Set a static payload field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.intent.payload.insert(key.into(), value.into());
        self
    }

    /// Attach a build instruction.
    pub fn build_from(mut self, build: BuildInstruction) -> Self {
        self.intent.build = Some(build);
        self
    }

    /// Finish the intent.
    pub fn build(self) -> Intent {
        self.intent
    }
}

impl BuildInstruction {
    /// Instruction reading from a `$ctx.` path.
    pub fn from_path(from: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::default()
        }
    }

    /// Require `key == value` on every source item.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Map items into `target` (e.g. `updates[]`) using `template`.
    pub fn map(mut self, target: impl Into<String>, template: Value) -> Self {
        let mut map = Map::new();
        map.insert(target.into(), template);
        self.map = Some(map);
        self
    }
}

// Lenient field decoders: a field of the wrong JSON type is treated as absent
// so one malformed intent does not reject the whole batch.

fn lenient_object<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_object(deserializer)?.unwrap_or_default())
}

fn lenient_optional_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        Value::String(single) => Ok(vec![single]),
        _ => Ok(Vec::new()),
    }
}

fn lenient_build<'de, D>(deserializer: D) -> Result<Option<BuildInstruction>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}
