//! Search projection of one corpus plus its standing-query topic.
//!
//! A `SearchIndex` owns one tokenized index and one subscription topic, both
//! named by the corpus path's doc-id. Writes cascade into the parent corpus,
//! so a record is searchable from every enclosing corpus.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::datastore::DEFAULT_LIMIT;
use crate::document::Document;
use crate::error::{DataHubError, Result};
use crate::models::IndexMap;
use crate::path::Path;
use crate::subscription_id::{INTERNAL_ENDPOINT, SubscriptionId, validate_endpoint};
use crate::tasks::TaskQueue;
use crate::user::User;

pub mod backend;
pub mod delivery;
pub mod matcher;
pub mod memory;
pub mod query;
pub mod record;
mod registry;
pub mod schema;

#[cfg(test)]
mod tests;

pub use backend::{FieldSchema, MatchBackend, ScoredHit, SearchBackend, SubscriptionInfo};
pub use delivery::{EndpointInbox, MatchMessage, MatchSink};
pub use matcher::MemoryMatchBackend;
pub use memory::MemorySearchBackend;
pub use record::{FieldType, FieldValue, INTERNAL_PATH_FIELD, IndexRecord};
pub use registry::CorpusRegistry;
pub use schema::SchemaRegistry;

/// Always-false query seeded into every topic.
pub const UNSATISFIABLE_QUERY: &str = "(a OR b) AND NOT (a OR b)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Upper bound for standing-query lifetimes.
    pub max_subscription_secs: u64,
    /// Page size used when walking ids for bulk deletion.
    pub page_size: usize,
    pub delete_batch_size: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_subscription_secs: 3600,
            page_size: 100,
            delete_batch_size: 100,
        }
    }
}

/// Collaborators shared by every corpus of one hub.
#[derive(Clone)]
pub struct SearchServices {
    pub backend: Arc<dyn SearchBackend>,
    pub matcher: Arc<dyn MatchBackend>,
    pub schema: Arc<SchemaRegistry>,
    pub sink: Arc<dyn MatchSink>,
    pub tasks: Arc<TaskQueue>,
    pub settings: SearchSettings,
}

impl std::fmt::Debug for SearchServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchServices")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SearchServices {
    /// In-memory search and match backends over the given queue and sink.
    #[must_use]
    pub fn in_memory(
        tasks: Arc<TaskQueue>,
        sink: Arc<dyn MatchSink>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            backend: Arc::new(MemorySearchBackend::new()),
            matcher: Arc::new(MemoryMatchBackend::new()),
            schema: Arc::new(SchemaRegistry::new()),
            sink,
            tasks,
            settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub offset: usize,
    pub limit: usize,
    /// Endpoint to register a standing query for.
    pub endpoint: Option<String>,
    /// Standing-query lifetime in seconds; negative means no subscription
    /// and zero means no expiry.
    pub duration: i64,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
            endpoint: None,
            duration: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// One `{path: object}` entry per hit, best first.
    pub results: Vec<Document>,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

pub struct SearchIndex {
    corpus: Path,
    name: String,
    parent: Option<Arc<SearchIndex>>,
    services: SearchServices,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("corpus", &self.corpus)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SearchIndex {
    fn new(corpus: Path, parent: Option<Arc<Self>>, services: SearchServices) -> Result<Self> {
        let name = corpus.to_doc_id();
        let index = Self {
            corpus,
            name,
            parent,
            services,
        };
        index.seed_topic()?;
        index.register_processors()?;
        Ok(index)
    }

    fn seed_topic(&self) -> Result<()> {
        let seed = SubscriptionId::internal(&self.name, UNSATISFIABLE_QUERY);
        let schema = self.services.schema.get(&self.corpus)?;
        self.services
            .matcher
            .subscribe(&self.name, &seed, 0, UNSATISFIABLE_QUERY, &schema)
    }

    fn register_processors(&self) -> Result<()> {
        let backend = Arc::clone(&self.services.backend);
        let index = self.name.clone();
        self.services
            .tasks
            .register(&self.docs_processor(), move |batch: &[String]| -> Result<()> {
                backend.remove(&index, batch)
            })?;

        let matcher = Arc::clone(&self.services.matcher);
        let topic = self.name.clone();
        self.services
            .tasks
            .register(&self.queries_processor(), move |batch: &[String]| -> Result<()> {
                batch
                    .iter()
                    .try_for_each(|id| matcher.unsubscribe(&topic, id))
            })
    }

    fn docs_processor(&self) -> String {
        format!("delete_docs:{}", self.name)
    }

    fn queries_processor(&self) -> String {
        format!("delete_queries:{}", self.name)
    }

    #[must_use]
    pub const fn corpus(&self) -> &Path {
        &self.corpus
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// Indexes `doc` at `path` here and in every enclosing corpus, then
    /// delivers it to the standing queries it satisfies.
    pub fn create(&self, path: &Path, doc: &Document) -> Result<()> {
        if !self.corpus.is_parent_of(path) {
            return Err(DataHubError::InvalidSubPath {
                path: path.to_string(),
                corpus: self.corpus.to_string(),
            });
        }
        let record = IndexRecord::from_document(path, doc);
        self.services.backend.add(&self.name, record.clone())?;
        self.services.schema.merge(path, &record.field_types())?;
        self.deliver_matches(&record)?;
        tracing::debug!(corpus = %self.corpus, path = %path, "indexed");

        if let Some(parent) = &self.parent {
            parent.create(path, doc)?;
        }
        Ok(())
    }

    fn deliver_matches(&self, record: &IndexRecord) -> Result<()> {
        let matched = self.services.matcher.match_record(&self.name, record)?;
        let mut by_endpoint = BTreeMap::<String, Vec<String>>::new();
        for id in matched.into_iter().filter(|id| !id.is_internal()) {
            by_endpoint
                .entry(id.endpoint().to_string())
                .or_default()
                .push(id.to_string());
        }
        for (endpoint, subscription_ids) in by_endpoint {
            let message = MatchMessage {
                endpoint: endpoint.clone(),
                path: record.path.to_string(),
                object: record.object.clone(),
                subscription_ids,
            };
            if let Err(err) = self.services.sink.deliver(message) {
                tracing::warn!(endpoint, path = %record.path, error = %err, "match delivery failed");
            }
        }
        Ok(())
    }

    /// Removes `paths` from this index and every enclosing one.
    pub fn delete(&self, user: &User, paths: &[Path]) -> Result<()> {
        let ids = paths.iter().map(Path::to_doc_id).collect::<Vec<_>>();
        self.services.backend.remove(&self.name, &ids)?;
        tracing::debug!(corpus = %self.corpus, count = ids.len(), user = user.effective_id(), "unindexed");
        if let Some(parent) = &self.parent {
            parent.delete(user, paths)?;
        }
        Ok(())
    }

    /// Searches the subtree under `path`. With an endpoint and a
    /// non-negative duration, the scoped query is registered as a standing
    /// query before the snapshot is taken.
    pub fn search(
        &self,
        path: &Path,
        request: &SearchRequest,
        user: &User,
    ) -> Result<SearchResponse> {
        let scoped = scoped_query(path, &request.query);
        let subscription_id = match &request.endpoint {
            Some(endpoint) if request.duration >= 0 => {
                Some(self.subscribe(path, endpoint, &scoped, request.duration)?)
            }
            _ => None,
        };

        let hits = self
            .services
            .backend
            .search(&self.name, &scoped, request.offset, request.limit)?;
        tracing::debug!(
            corpus = %self.corpus,
            path = %path,
            user = user.effective_id(),
            hits = hits.len(),
            "search"
        );
        let results = hits
            .into_iter()
            .map(|hit| {
                let mut entry = Document::new();
                entry.insert(hit.path.to_string(), Value::Object(hit.object));
                entry
            })
            .collect::<Vec<_>>();
        Ok(SearchResponse {
            results,
            offset: request.offset,
            limit: request.limit,
            subscription_id,
        })
    }

    fn subscribe(&self, path: &Path, endpoint: &str, query: &str, duration: i64) -> Result<String> {
        let id = SubscriptionId::new(endpoint, self.name.as_str(), query)?;
        let requested = u64::try_from(duration).unwrap_or(0);
        let max = self.services.settings.max_subscription_secs;
        let secs = if requested == 0 || max == 0 {
            requested
        } else {
            requested.min(max)
        };
        let schema = self.services.schema.get(path)?;
        self.services
            .matcher
            .subscribe(&self.name, &id, secs, query, &schema)?;
        Ok(id.to_string())
    }

    #[must_use]
    pub fn index_map(&self) -> IndexMap {
        IndexMap {
            index: self.name.clone(),
            topic: self.name.clone(),
        }
    }

    /// Queues deletion of every record and every caller-owned standing
    /// query of this corpus. Returns the number of batches enqueued; the
    /// deletions happen when the task queue runs.
    pub fn delete_indexes(&self) -> Result<usize> {
        let settings = self.services.settings;
        let backend = Arc::clone(&self.services.backend);
        let mut docs = PagedIds::new(|after: Option<&str>| {
            backend.list_ids(&self.name, after, settings.page_size)
        });
        let doc_batches = self.services.tasks.enqueue_process(
            docs.by_ref(),
            settings.delete_batch_size,
            &self.docs_processor(),
        )?;
        docs.finish()?;

        let matcher = Arc::clone(&self.services.matcher);
        let internal = SubscriptionId::endpoint_prefix(INTERNAL_ENDPOINT);
        let mut queries = PagedIds::new(|after: Option<&str>| {
            let start = after.map_or_else(String::new, |last| format!("{last}\u{0}"));
            matcher
                .list_subscriptions(&self.name, &start, settings.page_size, None)
                .map(|page| page.into_iter().map(|info| info.id).collect())
        });
        let query_batches = self.services.tasks.enqueue_process(
            queries.by_ref().filter(|id| !id.starts_with(&internal)),
            settings.delete_batch_size,
            &self.queries_processor(),
        )?;
        queries.finish()?;

        tracing::info!(
            corpus = %self.corpus,
            doc_batches,
            query_batches,
            "queued index wipe"
        );
        Ok(doc_batches + query_batches)
    }

    /// Unsubscribes each id from the topic it was registered on. Every id
    /// is validated before anything is removed.
    pub fn delete_queries(&self, ids: &[String]) -> Result<()> {
        let parsed = ids
            .iter()
            .map(|raw| {
                let id = SubscriptionId::parse(raw)?;
                if id.is_internal() {
                    return Err(DataHubError::Validation(format!(
                        "subscription({raw}) is system owned"
                    )));
                }
                Ok((id, raw))
            })
            .collect::<Result<Vec<_>>>()?;
        for (id, raw) in parsed {
            self.services.matcher.unsubscribe(id.topic(), raw)?;
        }
        tracing::debug!(corpus = %self.corpus, count = ids.len(), "unsubscribed");
        Ok(())
    }

    /// Live standing queries owned by `endpoint`, in id order.
    pub fn retrieve_queries(
        &self,
        endpoint: &str,
        limit: usize,
        expires_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubscriptionInfo>> {
        validate_endpoint(endpoint)?;
        let prefix = SubscriptionId::endpoint_prefix(endpoint);
        let page = self
            .services
            .matcher
            .list_subscriptions(&self.name, &prefix, limit, expires_before)?;
        Ok(page
            .into_iter()
            .take_while(|info| info.id.starts_with(&prefix))
            .collect())
    }
}

/// `INTERNAL_PATH_FIELD:<doc-id>`, AND-ed with the caller's query when
/// there is one.
fn scoped_query(path: &Path, query: &str) -> String {
    let scope = format!("{INTERNAL_PATH_FIELD}:{}", path.to_doc_id());
    let query = query.trim();
    if query.is_empty() {
        scope
    } else {
        format!("{scope} AND ({query})")
    }
}

/// Ids fetched page by page, each page starting just past the last id seen.
/// A fetch error stops iteration and is reported by `finish`.
struct PagedIds<F> {
    fetch: F,
    cursor: Option<String>,
    buffer: VecDeque<String>,
    exhausted: bool,
    error: Option<DataHubError>,
}

impl<F> PagedIds<F>
where
    F: FnMut(Option<&str>) -> Result<Vec<String>>,
{
    fn new(fetch: F) -> Self {
        Self {
            fetch,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
            error: None,
        }
    }

    fn finish(self) -> Result<()> {
        self.error.map_or(Ok(()), Err)
    }
}

impl<F> Iterator for PagedIds<F>
where
    F: FnMut(Option<&str>) -> Result<Vec<String>>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.buffer.is_empty() && !self.exhausted {
            match (self.fetch)(self.cursor.as_deref()) {
                Ok(page) if page.is_empty() => self.exhausted = true,
                Ok(page) => {
                    self.cursor = page.last().cloned();
                    self.buffer.extend(page);
                }
                Err(err) => {
                    self.exhausted = true;
                    self.error = Some(err);
                }
            }
        }
        self.buffer.pop_front()
    }
}
