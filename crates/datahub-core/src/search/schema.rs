use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{DataHubError, Result};
use crate::path::Path;

use super::backend::FieldSchema;
use super::record::{FieldType, INTERNAL_PATH_FIELD};

/// Field types seen under each path. A record's fields are merged into the
/// schema of its path and of every ancestor, so a standing query registered
/// on any of them can be type-checked. A later type for the same field
/// replaces the earlier one.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, FieldSchema>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, path: &Path, fields: &FieldSchema) -> Result<()> {
        let mut schemas = self
            .schemas
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("schema registry"))?;
        for ancestor in path.lineage() {
            let schema = schemas.entry(ancestor.to_doc_id()).or_default();
            for (name, field_type) in fields {
                schema.insert(name.clone(), *field_type);
            }
        }
        Ok(())
    }

    /// Schema for `path`; always carries the internal ancestor field.
    pub fn get(&self, path: &Path) -> Result<FieldSchema> {
        let schemas = self
            .schemas
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("schema registry"))?;
        let mut schema = schemas.get(&path.to_doc_id()).cloned().unwrap_or_default();
        schema.insert(INTERNAL_PATH_FIELD.to_string(), FieldType::Atom);
        Ok(schema)
    }
}
