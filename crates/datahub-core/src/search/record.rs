use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, is_internal_field};
use crate::path::{Path, ancestor_tokens};

/// Field holding the doc-ids of every ancestor of the record's path. Carries
/// the internal query field prefix, so it never reaches callers.
pub const INTERNAL_PATH_FIELD: &str = "INTERNAL__QUERY__FIELD__path";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Tokenized, case-insensitive words.
    Text,
    /// Whitespace separated tokens matched verbatim.
    Atom,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Atom(String),
    Number(f64),
}

impl FieldValue {
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Text(_) => FieldType::Text,
            Self::Atom(_) => FieldType::Atom,
            Self::Number(_) => FieldType::Number,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(flag) => Some(Self::Atom(flag.to_string())),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => Some(Self::Text(value.to_string())),
        }
    }
}

/// Indexable projection of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub path: Path,
    pub fields: BTreeMap<String, FieldValue>,
    pub object: Document,
}

impl IndexRecord {
    /// Null fields are skipped; nested values are indexed as their JSON text.
    #[must_use]
    pub fn from_document(path: &Path, doc: &Document) -> Self {
        let mut fields = doc
            .iter()
            .filter(|(name, _)| !is_internal_field(name))
            .filter_map(|(name, value)| {
                FieldValue::from_json(value).map(|field| (name.clone(), field))
            })
            .collect::<BTreeMap<_, _>>();
        fields.insert(
            INTERNAL_PATH_FIELD.to_string(),
            FieldValue::Atom(ancestor_tokens(path)),
        );
        let object = doc
            .iter()
            .filter(|(name, _)| !is_internal_field(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            id: path.to_doc_id(),
            path: path.clone(),
            fields,
            object,
        }
    }

    #[must_use]
    pub fn field_types(&self) -> BTreeMap<String, FieldType> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.field_type()))
            .collect()
    }
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coerces_field_types_and_tags_ancestors() {
        let path = Path::parse("/a/b").expect("parse");
        let Value::Object(doc) = json!({
            "title": "Hello World",
            "n": 3,
            "flag": true,
            "gone": null,
            "nested": {"x": 1},
            "##PARENT##": "hidden",
        }) else {
            unreachable!()
        };
        let record = IndexRecord::from_document(&path, &doc);
        assert_eq!(record.id, "ROOTa_P2Fb");
        assert_eq!(record.fields["title"], FieldValue::Text("Hello World".to_string()));
        assert_eq!(record.fields["n"], FieldValue::Number(3.0));
        assert_eq!(record.fields["flag"], FieldValue::Atom("true".to_string()));
        assert_eq!(record.fields["nested"], FieldValue::Text("{\"x\":1}".to_string()));
        assert!(!record.fields.contains_key("gone"));
        assert!(!record.fields.contains_key("##PARENT##"));
        assert!(!record.object.contains_key("##PARENT##"));
        assert_eq!(record.object["gone"], Value::Null);
        assert_eq!(
            record.fields[INTERNAL_PATH_FIELD],
            FieldValue::Atom("ROOTa_P2Fb ROOTa ROOT".to_string())
        );
        assert_eq!(record.field_types()[INTERNAL_PATH_FIELD], FieldType::Atom);
    }

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(tokenize("Hello, World! x-y"), vec!["hello", "world", "x", "y"]);
        assert!(tokenize(" .,; ").is_empty());
    }
}
