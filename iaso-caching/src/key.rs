//! Query keys

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::warn;

/// Composite cache key: a tag followed by serializable parameters.
///
/// Two keys are equal when their canonical JSON encodings are equal, so
/// objects with the same fields in a different order identify the same
/// entry.
#[derive(Debug, Clone)]
pub struct QueryKey {
    parts: Vec<Value>,
    canonical: String,
}

impl QueryKey {
    pub fn new(tag: impl Into<String>) -> Self {
        Self::from_parts(vec![Value::String(tag.into())])
    }

    pub fn from_parts(parts: Vec<Value>) -> Self {
        let canonical = canonical_json(&Value::Array(parts.clone()));
        Self { parts, canonical }
    }

    /// Append a serializable parameter
    pub fn with<P: Serialize>(self, part: P) -> Self {
        let mut parts = self.parts;
        parts.push(to_part(part));
        Self::from_parts(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// First part when it is a string
    pub fn tag(&self) -> Option<&str> {
        self.parts.first().and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether this key, used as a filter, selects `other`.
    ///
    /// A filter matches every key it is a prefix of; the empty key matches
    /// everything.
    pub fn matches(&self, other: &QueryKey) -> bool {
        self.parts.len() <= other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| canonical_json(a) == canonical_json(b))
    }

    pub fn as_canonical(&self) -> &str {
        &self.canonical
    }
}

fn to_part<P: Serialize>(part: P) -> Value {
    serde_json::to_value(part).unwrap_or_else(|e| {
        warn!("Query key part could not be serialized: {}", e);
        Value::Null
    })
}

/// JSON encoding with object keys sorted
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let inner: Vec<String> = fields
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        scalar => scalar.to_string(),
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl From<&str> for QueryKey {
    fn from(tag: &str) -> Self {
        QueryKey::new(tag)
    }
}

impl From<String> for QueryKey {
    fn from(tag: String) -> Self {
        QueryKey::new(tag)
    }
}

impl From<&QueryKey> for QueryKey {
    fn from(key: &QueryKey) -> Self {
        key.clone()
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(parts: Vec<Value>) -> Self {
        QueryKey::from_parts(parts)
    }
}

impl<P: Serialize> From<(&str, P)> for QueryKey {
    fn from((tag, part): (&str, P)) -> Self {
        QueryKey::new(tag).with(part)
    }
}

impl<P: Serialize, Q: Serialize> From<(&str, P, Q)> for QueryKey {
    fn from((tag, first, second): (&str, P, Q)) -> Self {
        QueryKey::new(tag).with(first).with(second)
    }
}
