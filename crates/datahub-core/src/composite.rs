use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::acl::{AccessControl, Op};
use crate::datastore::ListOptions;
use crate::document::Document;
use crate::error::{DataHubError, Result};
use crate::models::IndexMap;
use crate::path::Path;
use crate::search::{SearchIndex, SearchRequest, SearchResponse, SubscriptionInfo};
use crate::secure::SecureDatastore;
use crate::subscription_id::SubscriptionId;
use crate::user::User;

/// Fans writes out to the secured primary store and one corpus's search
/// projection. The primary store always goes first; when it fails the
/// search projection is not touched.
#[derive(Debug, Clone)]
pub struct CompositeStore {
    secure: SecureDatastore,
    search: Arc<SearchIndex>,
}

impl CompositeStore {
    #[must_use]
    pub const fn new(secure: SecureDatastore, search: Arc<SearchIndex>) -> Self {
        Self { secure, search }
    }

    #[must_use]
    pub const fn acl(&self) -> &AccessControl {
        self.secure.acl()
    }

    #[must_use]
    pub const fn search_index(&self) -> &Arc<SearchIndex> {
        &self.search
    }

    pub fn create(&self, parent: &Path, doc: &Document, user: &User) -> Result<Path> {
        let path = self.secure.create(parent, doc, user)?;
        self.mirror(&path, doc)?;
        Ok(path)
    }

    pub fn create_named(
        &self,
        parent: &Path,
        name: &str,
        doc: &Document,
        user: &User,
    ) -> Result<Path> {
        let path = self.secure.create_named(parent, name, doc, user)?;
        self.mirror(&path, doc)?;
        Ok(path)
    }

    pub fn retrieve(&self, path: &Path, user: &User) -> Result<Document> {
        self.secure.retrieve(path, user)
    }

    pub fn list(&self, path: &Path, options: &ListOptions, user: &User) -> Result<Document> {
        self.secure.list(path, options, user)
    }

    /// Upserts `doc` and re-indexes it. The corpus root itself is only
    /// indexed by the enclosing corpus, so it is mirrored there.
    pub fn update(&self, path: &Path, doc: &Document, user: &User) -> Result<()> {
        self.secure.update(path, doc, user)?;
        if self.search.corpus().is_parent_of(path) {
            self.mirror(path, doc)?;
        } else if self.search.corpus() == path
            && let Some(parent) = self.search.parent()
        {
            parent
                .create(path, doc)
                .map_err(|err| DataHubError::service("search", err))?;
        }
        Ok(())
    }

    /// Deletes from the primary store, then from the search projection. A
    /// failure of the second step is logged and otherwise ignored.
    pub fn delete(&self, user: &User, paths: &[Path]) -> Result<()> {
        self.secure.delete(user, paths)?;
        if let Err(err) = self.search.delete(user, paths) {
            tracing::warn!(
                corpus = %self.search.corpus(),
                count = paths.len(),
                error = %err,
                "search projection delete failed"
            );
        }
        Ok(())
    }

    pub fn search(
        &self,
        path: &Path,
        request: &SearchRequest,
        user: &User,
    ) -> Result<SearchResponse> {
        self.acl().assert_allowed(path, user, Op::Read)?;
        self.search.search(path, request, user)
    }

    pub fn get_index_map(&self, path: &Path, user: &User) -> Result<IndexMap> {
        require_admin(path, user, Op::Read)?;
        Ok(self.search.index_map())
    }

    /// Queues the wipe of this corpus's records and standing queries.
    pub fn delete_indexes(&self, path: &Path, user: &User) -> Result<usize> {
        require_admin(path, user, Op::Delete)?;
        self.search.delete_indexes()
    }

    /// Deletes standing queries. Needs READ on `path`; non-admins may only
    /// delete ids registered for their own endpoint.
    pub fn delete_queries(&self, user: &User, path: &Path, ids: &[String]) -> Result<()> {
        self.acl().assert_allowed(path, user, Op::Read)?;
        if !user.is_admin() {
            for raw in ids {
                if SubscriptionId::parse(raw)?.endpoint() != user.effective_id() {
                    return Err(DataHubError::restricted(path, user, Op::Delete));
                }
            }
        }
        tracing::debug!(user = user.effective_id(), count = ids.len(), "delete queries");
        self.search.delete_queries(ids)
    }

    /// Standing queries owned by the acting user.
    pub fn retrieve_queries(
        &self,
        user: &User,
        path: &Path,
        limit: usize,
        expires_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubscriptionInfo>> {
        self.acl().assert_allowed(path, user, Op::Read)?;
        self.search
            .retrieve_queries(user.effective_id(), limit, expires_before)
    }

    fn mirror(&self, path: &Path, doc: &Document) -> Result<()> {
        self.search
            .create(path, doc)
            .map_err(|err| DataHubError::service("search", err))
    }
}

fn require_admin(path: &Path, user: &User, op: Op) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(DataHubError::restricted(path, user, op))
    }
}
