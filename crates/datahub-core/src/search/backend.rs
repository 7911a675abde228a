use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Result;
use crate::path::Path;
use crate::subscription_id::SubscriptionId;

use super::record::{FieldType, IndexRecord};

/// Field name to type, as tracked per path by the schema registry.
pub type FieldSchema = BTreeMap<String, FieldType>;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub id: String,
    pub path: Path,
    pub object: Document,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub query: String,
    /// `None` for subscriptions that never expire.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Tokenized full-text index holding one record set per index name.
pub trait SearchBackend: Send + Sync {
    /// Adds or replaces the record with the same id.
    fn add(&self, index: &str, record: IndexRecord) -> Result<()>;

    /// Unknown ids are ignored.
    fn remove(&self, index: &str, ids: &[String]) -> Result<()>;

    /// Best hits first; ties break on id.
    fn search(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoredHit>>;

    /// One page of ids in ascending order, strictly after `start_after`.
    fn list_ids(
        &self,
        index: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>>;
}

/// Standing-query registry that matches incoming records per topic.
pub trait MatchBackend: Send + Sync {
    /// `duration_secs == 0` never expires. Field filters in `query` are
    /// checked against `schema`.
    fn subscribe(
        &self,
        topic: &str,
        id: &SubscriptionId,
        duration_secs: u64,
        query: &str,
        schema: &FieldSchema,
    ) -> Result<()>;

    fn unsubscribe(&self, topic: &str, id: &str) -> Result<()>;

    /// Live subscriptions with `id >= start`, in id order. With
    /// `expires_before`, only those expiring before that instant.
    fn list_subscriptions(
        &self,
        topic: &str,
        start: &str,
        limit: usize,
        expires_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubscriptionInfo>>;

    fn match_record(&self, topic: &str, record: &IndexRecord) -> Result<Vec<SubscriptionId>>;
}
