use std::sync::Arc;

use serde_json::Value;

use crate::document::{Document, Entity};
use crate::error::{DataHubError, Result};
use crate::keyed::KeyedStore;
use crate::path::Path;
use crate::user::User;

pub const DEFAULT_LIMIT: usize = 10;

/// Paging for `list`. `fields` and `order` are accepted but not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub offset: usize,
    pub limit: usize,
    pub fields: Vec<String>,
    pub order: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
            fields: Vec::new(),
            order: None,
        }
    }
}

/// Authoritative document store addressed by path.
#[derive(Clone)]
pub struct Datastore {
    store: Arc<dyn KeyedStore>,
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore").finish_non_exhaustive()
    }
}

impl Datastore {
    /// Wraps `store` and makes sure the ROOT entity exists.
    pub fn new(store: Arc<dyn KeyedStore>) -> Result<Self> {
        let root = Path::root().to_key();
        if store.get(&root)?.is_none() {
            store.put(Entity::from_document(root, &Document::new())?)?;
            tracing::info!("seeded root entity");
        }
        Ok(Self { store })
    }

    #[must_use]
    pub fn keyed_store(&self) -> Arc<dyn KeyedStore> {
        Arc::clone(&self.store)
    }

    pub fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.store.get(&path.to_key())?.is_some())
    }

    /// Stores `doc` under a freshly allocated serial child of `parent`.
    pub fn create(&self, parent: &Path, doc: &Document, user: &User) -> Result<Path> {
        self.require(parent)?;
        let key = parent.to_key().incomplete_child();
        let key = self.store.put(Entity::from_document(key, doc)?)?;
        let path = Path::from_key(&key)?;
        tracing::debug!(path = %path, user = user.effective_id(), "created");
        Ok(path)
    }

    /// Stores `doc` under `parent/name`, overwriting any existing record.
    pub fn create_named(
        &self,
        parent: &Path,
        name: &str,
        doc: &Document,
        user: &User,
    ) -> Result<Path> {
        self.require(parent)?;
        let path = parent.join(name)?;
        self.store.put(Entity::from_document(path.to_key(), doc)?)?;
        tracing::debug!(path = %path, user = user.effective_id(), "created named");
        Ok(path)
    }

    pub fn retrieve(&self, path: &Path, user: &User) -> Result<Document> {
        tracing::debug!(path = %path, user = user.effective_id(), "retrieve");
        let entity = self
            .store
            .get(&path.to_key())?
            .ok_or_else(|| DataHubError::NotFound(path.to_string()))?;
        Ok(entity.to_document())
    }

    /// Immediate children of `path`, keyed by their last segment.
    pub fn list(&self, path: &Path, options: &ListOptions, user: &User) -> Result<Document> {
        tracing::debug!(
            path = %path,
            user = user.effective_id(),
            offset = options.offset,
            limit = options.limit,
            "list"
        );
        let children = self
            .store
            .query_children(&path.to_key(), options.offset, options.limit)?;
        let mut listing = Document::new();
        for entity in children {
            let child = Path::from_key(&entity.key)?;
            listing.insert(child.file_name(), Value::Object(entity.to_document()));
        }
        Ok(listing)
    }

    /// Upsert at exactly `path`.
    pub fn update(&self, path: &Path, doc: &Document, user: &User) -> Result<()> {
        self.store
            .put(Entity::from_document(path.to_key(), doc)?)?;
        tracing::debug!(path = %path, user = user.effective_id(), "updated");
        Ok(())
    }

    /// Deletes every path after checking that all of them exist. The deletes
    /// themselves are not atomic across keys.
    pub fn delete(&self, user: &User, paths: &[Path]) -> Result<()> {
        if paths.iter().any(Path::is_root) {
            return Err(DataHubError::Validation("ROOT cannot be deleted".to_string()));
        }
        for path in paths {
            self.require(path)?;
        }
        let keys = paths.iter().map(Path::to_key).collect::<Vec<_>>();
        self.store.delete(&keys)?;
        tracing::debug!(count = paths.len(), user = user.effective_id(), "deleted");
        Ok(())
    }

    fn require(&self, path: &Path) -> Result<()> {
        if self.exists(path)? {
            Ok(())
        } else {
            Err(DataHubError::NotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::SqliteStateStore;

    fn datastore() -> Datastore {
        let store = SqliteStateStore::open_in_memory().expect("open");
        Datastore::new(Arc::new(store)).expect("datastore")
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn path(raw: &str) -> Path {
        Path::parse(raw).expect("parse")
    }

    #[test]
    fn root_is_seeded_and_retrievable() {
        let ds = datastore();
        let user = User::anonymous();
        assert_eq!(ds.retrieve(&Path::root(), &user).expect("root"), Document::new());
    }

    #[test]
    fn serial_creates_are_distinct() {
        let ds = datastore();
        let user = User::anonymous();
        let mut paths = Vec::new();
        for i in 0..10 {
            paths.push(
                ds.create(&Path::root(), &doc(json!({"i": i})), &user)
                    .expect("create"),
            );
        }
        let mut unique = paths.iter().map(ToString::to_string).collect::<Vec<_>>();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 10);
        assert!(paths.iter().all(Path::is_special_serial));
        assert_eq!(
            ds.retrieve(&paths[3], &user).expect("retrieve"),
            doc(json!({"i": 3}))
        );
    }

    #[test]
    fn create_under_missing_parent_is_not_found() {
        let ds = datastore();
        let err = ds
            .create(&path("/missing"), &Document::new(), &User::anonymous())
            .expect_err("must fail");
        assert!(matches!(err, DataHubError::NotFound(_)));
        let err = ds
            .create_named(&path("/missing"), "x", &Document::new(), &User::anonymous())
            .expect_err("must fail");
        assert!(matches!(err, DataHubError::NotFound(_)));
    }

    #[test]
    fn named_create_then_delete_scenario() {
        let ds = datastore();
        let user = User::new("u");
        let foo = ds
            .create_named(&Path::root(), "foo", &Document::new(), &user)
            .expect("foo");
        assert_eq!(foo.to_string(), "/foo");
        let bar = ds
            .create_named(&foo, "bar", &Document::new(), &user)
            .expect("bar");
        assert_eq!(bar.to_string(), "/foo/bar");
        assert_eq!(ds.retrieve(&bar, &user).expect("retrieve"), Document::new());

        ds.delete(&user, std::slice::from_ref(&bar)).expect("delete");
        let err = ds.retrieve(&bar, &user).expect_err("must fail");
        assert!(matches!(err, DataHubError::NotFound(_)));
    }

    #[test]
    fn named_create_overwrites() {
        let ds = datastore();
        let user = User::anonymous();
        ds.create_named(&Path::root(), "n", &doc(json!({"v": 1})), &user)
            .expect("first");
        ds.create_named(&Path::root(), "n", &doc(json!({"v": 2})), &user)
            .expect("second");
        assert_eq!(
            ds.retrieve(&path("/n"), &user).expect("retrieve"),
            doc(json!({"v": 2}))
        );
    }

    #[test]
    fn delete_checks_every_path_before_deleting() {
        let ds = datastore();
        let user = User::anonymous();
        let p1 = ds
            .create_named(&Path::root(), "p1", &Document::new(), &user)
            .expect("p1");
        let err = ds
            .delete(&user, &[p1.clone(), path("/p2")])
            .expect_err("must fail");
        assert!(matches!(err, DataHubError::NotFound(ref p) if p == "/p2"));
        assert!(ds.retrieve(&p1, &user).is_ok());
    }

    #[test]
    fn delete_root_is_rejected() {
        let ds = datastore();
        let err = ds
            .delete(&User::anonymous(), &[Path::root()])
            .expect_err("must fail");
        assert!(matches!(err, DataHubError::Validation(_)));
    }

    #[test]
    fn update_upserts_and_preserves_nulls() {
        let ds = datastore();
        let user = User::anonymous();
        let target = path("/fresh/leaf");
        ds.update(&target, &doc(json!({"a": null, "b": [{"c": 1}]})), &user)
            .expect("upsert");
        assert_eq!(
            ds.retrieve(&target, &user).expect("retrieve"),
            doc(json!({"a": null, "b": [{"c": 1}]}))
        );
    }

    #[test]
    fn list_is_single_level_and_paged() {
        let ds = datastore();
        let user = User::anonymous();
        let base = ds
            .create_named(&Path::root(), "base", &Document::new(), &user)
            .expect("base");
        for name in ["a", "b", "c"] {
            let child = ds
                .create_named(&base, name, &doc(json!({"name": name})), &user)
                .expect("child");
            ds.create_named(&child, "nested", &Document::new(), &user)
                .expect("grandchild");
        }

        let all = ds
            .list(&base, &ListOptions::default(), &user)
            .expect("list");
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(all["b"], json!({"name": "b"}));

        let page = ds
            .list(
                &base,
                &ListOptions {
                    offset: 1,
                    limit: 1,
                    ..ListOptions::default()
                },
                &user,
            )
            .expect("page");
        assert_eq!(page.keys().collect::<Vec<_>>(), vec!["b"]);
        assert!(
            ds.list(&path("/nothing"), &ListOptions::default(), &user)
                .expect("empty")
                .is_empty()
        );
    }
}
