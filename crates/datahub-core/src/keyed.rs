use crate::document::Entity;
use crate::error::Result;
use crate::path::Key;

/// Primary keyed storage. Reads and writes are atomic per key; nothing
/// spanning several keys is.
pub trait KeyedStore: Send + Sync {
    fn get(&self, key: &Key) -> Result<Option<Entity>>;

    /// Persists `entity`. When the last key element has no id yet, a fresh
    /// serial is allocated; the stored key is returned either way.
    fn put(&self, entity: Entity) -> Result<Key>;

    fn delete(&self, keys: &[Key]) -> Result<()>;

    /// Resource children of `parent` (ACL records excluded), in key order.
    fn query_children(&self, parent: &Key, offset: usize, limit: usize) -> Result<Vec<Entity>>;
}
