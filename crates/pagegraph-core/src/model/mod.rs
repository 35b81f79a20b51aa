//! Data model for structured-data nodes.
//!
//! A node is a fixed-fields record (`@type`, `@id`) plus an open
//! side-mapping of extension properties. Keeping the reserved keys out of
//! the open mapping preserves static checking of the known fields without
//! losing extensibility.
//!
//! Emission is deterministic: `Node::to_value` produces keys in a stable
//! order (`@id`, `@type`, then properties lexicographically), so two
//! resolutions of the same input serialize byte-identically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod key;

/// An opaque identifier token: an absolute IRI, a fragment (`#name`),
/// or `url#fragment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A bare fragment like `#identity`, still to be anchored to a base.
    pub fn is_fragment(&self) -> bool {
        self.0.starts_with('#')
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Anchor a bare fragment to `base`; absolute ids pass through.
    pub fn anchored_to(&self, base: &str) -> Id {
        if self.is_fragment() {
            Id(format!("{base}{}", self.0))
        } else {
            self.clone()
        }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

/// A pointer-only relation value: exactly one field, the target's `@id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdReference {
    #[serde(rename = "@id")]
    pub id: Id,
}

impl IdReference {
    pub fn new(id: impl Into<Id>) -> Self {
        Self { id: id.into() }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "@id": self.id.as_str() })
    }
}

impl From<Id> for IdReference {
    fn from(id: Id) -> Self {
        Self { id }
    }
}

/// Policy for combining two nodes that share an identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupeStrategy {
    /// The incoming node fully replaces the stored one, keeping its position.
    #[default]
    Replace,
    /// Field-level merge; the stored node's values win on conflict.
    Merge,
}

/// True when a value counts as "unset" for defaulting, inheritance, merging
/// and required-field checks: absent call sites use `None`, and null, empty
/// string, empty array, and empty object are all treated as unset.
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// One structured-data record: reserved fields plus open extension
/// properties. The owning definition and dedupe strategy live on the
/// graph entry, never on the node, so they cannot leak into output.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    types: Vec<String>,
    id: Option<Id>,
    properties: Map<String, Value>,
}

impl Node {
    /// Build a node from a raw JSON mapping, pulling `@type`/`@id` out of
    /// the open properties. Fails with the offending reserved key and a
    /// human-readable detail when one is malformed.
    pub fn from_object(mut map: Map<String, Value>) -> Result<Self, (&'static str, String)> {
        let types = match map.remove("@type") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![s],
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s),
                        other => return Err(("@type", format!("invalid entry: {other}"))),
                    }
                }
                out
            }
            Some(other) => return Err(("@type", format!("expected string or strings: {other}"))),
        };

        let id = match map.remove("@id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.is_empty() => Some(Id::new(s)),
            Some(other) => return Err(("@id", format!("expected non-empty string: {other}"))),
        };

        Ok(Self {
            types,
            id,
            properties: map,
        })
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }

    pub fn push_type(&mut self, type_name: impl Into<String>) {
        let type_name = type_name.into();
        if !self.has_type(&type_name) {
            self.types.push(type_name);
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.properties.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.properties.insert(field.into(), value);
    }

    /// Set `field` only if it is currently unset. Returns whether a write
    /// happened. This is the primitive behind the precedence rule:
    /// explicit input > inherited meta > defaults.
    pub fn set_default(&mut self, field: impl Into<String>, value: Value) -> bool {
        let field = field.into();
        if self.is_set(&field) {
            return false;
        }
        self.properties.insert(field, value);
        true
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.properties.remove(field)
    }

    pub fn is_set(&self, field: &str) -> bool {
        match field {
            "@id" => self.id.is_some(),
            "@type" => !self.types.is_empty(),
            _ => self.properties.get(field).is_some_and(|v| !is_unset(v)),
        }
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.properties
    }

    /// Emit the node as a plain JSON object with deterministic key order.
    ///
    /// serde_json's default map is ordered, and `@id`/`@type` sort before
    /// every property key, so insertion into a fresh map is sufficient.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(id) = &self.id {
            out.insert("@id".to_string(), Value::String(id.as_str().to_string()));
        }
        match self.types.len() {
            0 => {}
            1 => {
                out.insert("@type".to_string(), Value::String(self.types[0].clone()));
            }
            _ => {
                out.insert(
                    "@type".to_string(),
                    Value::Array(self.types.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        for (k, v) in &self.properties {
            if !is_unset(v) {
                out.insert(k.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_object_pulls_reserved_keys() {
        let map = json!({"@type": "Organization", "@id": "#org", "name": "Acme"});
        let node = Node::from_object(map.as_object().unwrap().clone()).unwrap();
        assert_eq!(node.types(), ["Organization"]);
        assert_eq!(node.id().unwrap().as_str(), "#org");
        assert_eq!(node.get_str("name"), Some("Acme"));
        assert!(node.get("@type").is_none());
    }

    #[test]
    fn from_object_rejects_malformed_reserved_keys() {
        let map = json!({"@id": 42}).as_object().unwrap().clone();
        assert!(Node::from_object(map).is_err());

        let map = json!({"@type": [1]}).as_object().unwrap().clone();
        assert!(Node::from_object(map).is_err());
    }

    #[test]
    fn set_default_respects_existing_values() {
        let mut node =
            Node::from_object(json!({"name": "Acme"}).as_object().unwrap().clone()).unwrap();
        assert!(!node.set_default("name", json!("Other")));
        assert!(node.set_default("description", json!("desc")));
        assert_eq!(node.get_str("name"), Some("Acme"));
    }

    #[test]
    fn unset_covers_empty_shapes() {
        assert!(is_unset(&json!(null)));
        assert!(is_unset(&json!("")));
        assert!(is_unset(&json!([])));
        assert!(is_unset(&json!({})));
        assert!(!is_unset(&json!(0)));
        assert!(!is_unset(&json!(false)));
        assert!(!is_unset(&json!("x")));
    }

    #[test]
    fn to_value_orders_reserved_keys_first() {
        let mut node =
            Node::from_object(json!({"zeta": 1, "alpha": 2}).as_object().unwrap().clone()).unwrap();
        node.set_id(Id::new("https://x.com#org"));
        node.push_type("Organization");

        let keys: Vec<String> = node
            .to_value()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, ["@id", "@type", "alpha", "zeta"]);
    }

    #[test]
    fn fragment_ids_anchor_to_base() {
        let id = Id::new("#identity");
        assert!(id.is_fragment());
        assert_eq!(
            id.anchored_to("https://x.com").as_str(),
            "https://x.com#identity"
        );

        let abs = Id::new("https://x.com/about#webpage");
        assert_eq!(abs.anchored_to("https://other.com"), abs);
    }
}
