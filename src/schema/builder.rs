use serde_json::{Map, Value};

pub const SCHEMA_CONTEXT: &str = "https://schema.org";

/// Incremental JSON-LD object builder.
///
/// Setters accept optional values and [`SchemaBuilder::build`] runs a compact
/// pass, so callers can set every field they looked for and only the ones
/// actually found survive.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    fields: Map<String, Value>,
}

impl SchemaBuilder {
    /// Top-level object with `@context` and `@type`.
    pub fn new(schema_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("@context".into(), Value::String(SCHEMA_CONTEXT.into()));
        fields.insert("@type".into(), Value::String(schema_type.into()));
        Self { fields }
    }

    /// Nested object (no `@context`).
    pub fn nested(schema_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("@type".into(), Value::String(schema_type.into()));
        Self { fields }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn set_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// Nested object; dropped by `build` when nothing but `@type` remains.
    pub fn set_object(self, key: &str, child: SchemaBuilder) -> Self {
        match child.build_nested() {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn set_list<I, V>(self, key: &str, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.set(key, Value::Array(items))
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.get(key).and_then(|v| compact(v.clone())).is_some()
    }

    /// Compacted object. The top level always keeps `@context` and `@type`,
    /// even when no other field was found.
    pub fn build(self) -> Value {
        Value::Object(
            self.fields
                .into_iter()
                .filter_map(|(k, v)| compact(v).map(|v| (k, v)))
                .collect(),
        )
    }

    fn build_nested(self) -> Option<Value> {
        compact(Value::Object(self.fields))
    }
}

/// Drop nulls, blank strings, empty arrays and objects that carry nothing
/// besides JSON-LD keywords. Returns `None` when the value itself is empty.
pub fn compact(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else if trimmed.len() == s.len() {
                Some(Value::String(s))
            } else {
                Some(Value::String(trimmed.to_string()))
            }
        }
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(compact).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| compact(v).map(|v| (k, v)))
                .collect();
            let has_payload = map.keys().any(|k| !k.starts_with('@'));
            has_payload.then_some(Value::Object(map))
        }
        other => Some(other),
    }
}
