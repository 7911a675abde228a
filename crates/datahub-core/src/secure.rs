use crate::acl::{AccessControl, Op};
use crate::datastore::{Datastore, ListOptions};
use crate::document::Document;
use crate::error::{DataHubError, Result};
use crate::path::Path;
use crate::user::User;

/// `Datastore` with an ACL check in front of every operation:
/// create needs CREATE on the parent, delete needs DELETE on every target,
/// retrieve and list need READ, update needs UPDATE.
#[derive(Debug, Clone)]
pub struct SecureDatastore {
    datastore: Datastore,
    acl: AccessControl,
}

impl SecureDatastore {
    #[must_use]
    pub const fn new(datastore: Datastore, acl: AccessControl) -> Self {
        Self { datastore, acl }
    }

    #[must_use]
    pub const fn acl(&self) -> &AccessControl {
        &self.acl
    }

    #[must_use]
    pub const fn datastore(&self) -> &Datastore {
        &self.datastore
    }

    pub fn create(&self, parent: &Path, doc: &Document, user: &User) -> Result<Path> {
        self.acl.assert_allowed(parent, user, Op::Create)?;
        self.datastore.create(parent, doc, user)
    }

    pub fn create_named(
        &self,
        parent: &Path,
        name: &str,
        doc: &Document,
        user: &User,
    ) -> Result<Path> {
        self.acl.assert_allowed(parent, user, Op::Create)?;
        self.datastore.create_named(parent, name, doc, user)
    }

    pub fn retrieve(&self, path: &Path, user: &User) -> Result<Document> {
        self.acl.assert_allowed(path, user, Op::Read)?;
        self.datastore.retrieve(path, user)
    }

    pub fn list(&self, path: &Path, options: &ListOptions, user: &User) -> Result<Document> {
        self.acl.assert_allowed(path, user, Op::Read)?;
        self.datastore.list(path, options, user)
    }

    pub fn update(&self, path: &Path, doc: &Document, user: &User) -> Result<()> {
        match self.acl.assert_allowed(path, user, Op::Update) {
            Ok(()) => {}
            Err(DataHubError::NotFound(missing)) => {
                tracing::debug!(path = %path, missing, "update permission check hit a missing record");
            }
            Err(err) => return Err(err),
        }
        self.datastore.update(path, doc, user)
    }

    pub fn delete(&self, user: &User, paths: &[Path]) -> Result<()> {
        for path in paths {
            self.acl.assert_allowed(path, user, Op::Delete)?;
        }
        self.datastore.delete(user, paths)
    }
}
