use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::path::Key;

/// Caller-facing JSON object.
pub type Document = Map<String, Value>;

/// Back-reference from a stored entity to its parent key.
pub const INTERNAL_PARENT_FIELD: &str = "##PARENT##";

/// Prefix of fields owned by the search projection.
pub const INTERNAL_QUERY_FIELD_PREFIX: &str = "INTERNAL__QUERY__FIELD__";

#[must_use]
pub fn is_internal_field(name: &str) -> bool {
    name == INTERNAL_PARENT_FIELD || name.starts_with(INTERNAL_QUERY_FIELD_PREFIX)
}

/// Stored value. Nested objects and lists stay embedded; explicit nulls survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Property {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Key(String),
    Embedded(BTreeMap<String, Property>),
    List(Vec<Property>),
}

impl Property {
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(fields) => Self::Embedded(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Integer(number) => Value::Number((*number).into()),
            Self::Float(number) => Number::from_f64(*number).map_or(Value::Null, Value::Number),
            Self::Text(text) | Self::Key(text) => Value::String(text.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Embedded(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// One record in the primary keyed store.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: Key,
    pub properties: BTreeMap<String, Property>,
}

impl Entity {
    /// Builds a stored entity from a caller document. Caller-supplied internal
    /// fields are dropped; the parent back-reference is set from the key.
    pub fn from_document(key: Key, doc: &Document) -> crate::error::Result<Self> {
        let mut properties = doc
            .iter()
            .filter(|(name, _)| !is_internal_field(name))
            .map(|(name, value)| (name.clone(), Property::from_json(value)))
            .collect::<BTreeMap<_, _>>();
        if let Some(parent) = key.parent() {
            properties.insert(
                INTERNAL_PARENT_FIELD.to_string(),
                Property::Key(parent.encode()?),
            );
        }
        Ok(Self { key, properties })
    }

    #[must_use]
    pub fn with_properties(key: Key, properties: BTreeMap<String, Property>) -> Self {
        Self { key, properties }
    }

    /// Caller view: every internal field removed.
    #[must_use]
    pub fn to_document(&self) -> Document {
        self.properties
            .iter()
            .filter(|(name, _)| !is_internal_field(name))
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::path::Path;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn nulls_and_nesting_survive_storage_form() {
        let original = doc(json!({
            "a": null,
            "b": [1, {"c": null, "d": [true, "x"]}],
            "e": {"f": 2.5},
        }));
        let key = Path::parse("/x").expect("parse").to_key();
        let entity = Entity::from_document(key, &original).expect("entity");
        let stored = serde_json::to_string(&entity.properties).expect("serialize");
        let restored: BTreeMap<String, Property> =
            serde_json::from_str(&stored).expect("deserialize");
        let back = Entity::with_properties(entity.key.clone(), restored).to_document();
        assert_eq!(Value::Object(back), Value::Object(original));
    }

    #[test]
    fn internal_fields_are_hidden_and_parent_is_tracked() {
        let key = Path::parse("/a/b").expect("parse").to_key();
        let entity = Entity::from_document(
            key,
            &doc(json!({"x": 1, "##PARENT##": "spoof", "INTERNAL__QUERY__FIELD__path": "t"})),
        )
        .expect("entity");
        assert_eq!(
            entity.properties.get(INTERNAL_PARENT_FIELD),
            Some(&Property::Key("path(ROOT)/path(a)".to_string()))
        );
        assert_eq!(Value::Object(entity.to_document()), json!({"x": 1}));
    }

    #[test]
    fn root_entity_has_no_parent_reference() {
        let entity = Entity::from_document(crate::path::Key::root(), &Document::new())
            .expect("entity");
        assert!(entity.properties.is_empty());
    }
}
