use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{DataHubError, Result};
use crate::subscription_id::SubscriptionId;

use super::backend::{FieldSchema, MatchBackend, SubscriptionInfo};
use super::memory::MAX_PAGE_SIZE;
use super::query::Query;
use super::record::IndexRecord;

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    raw_query: String,
    query: Query,
    expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryMatchBackend {
    topics: RwLock<HashMap<String, BTreeMap<String, Subscription>>>,
}

impl MemoryMatchBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drops subscriptions that expired by `now`; returns how many went.
fn prune_expired(
    subscriptions: &mut BTreeMap<String, Subscription>,
    now: DateTime<Utc>,
) -> usize {
    let before = subscriptions.len();
    subscriptions.retain(|_, subscription| subscription.is_live(now));
    before - subscriptions.len()
}

fn expiry(duration_secs: u64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if duration_secs == 0 {
        return None;
    }
    let secs = i64::try_from(duration_secs).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(secs).and_then(|delta| now.checked_add_signed(delta))
}

impl MatchBackend for MemoryMatchBackend {
    fn subscribe(
        &self,
        topic: &str,
        id: &SubscriptionId,
        duration_secs: u64,
        query: &str,
        schema: &FieldSchema,
    ) -> Result<()> {
        let parsed = Query::parse(query)?;
        parsed.check_fields(schema)?;
        let now = Utc::now();
        let subscription = Subscription {
            id: id.clone(),
            raw_query: query.to_string(),
            query: parsed,
            expires_at: expiry(duration_secs, now),
        };
        let mut topics = self
            .topics
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("match topics"))?;
        let subscriptions = topics.entry(topic.to_string()).or_default();
        let pruned = prune_expired(subscriptions, now);
        subscriptions.insert(id.to_string(), subscription);
        tracing::debug!(topic, id = %id, duration_secs, pruned, "subscribed");
        Ok(())
    }

    fn unsubscribe(&self, topic: &str, id: &str) -> Result<()> {
        let mut topics = self
            .topics
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("match topics"))?;
        if let Some(subscriptions) = topics.get_mut(topic) {
            subscriptions.remove(id);
            let pruned = prune_expired(subscriptions, Utc::now());
            if pruned > 0 {
                tracing::debug!(topic, pruned, "pruned expired subscriptions");
            }
        }
        Ok(())
    }

    fn list_subscriptions(
        &self,
        topic: &str,
        start: &str,
        limit: usize,
        expires_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubscriptionInfo>> {
        let now = Utc::now();
        let topics = self
            .topics
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("match topics"))?;
        let Some(subscriptions) = topics.get(topic) else {
            return Ok(Vec::new());
        };
        Ok(subscriptions
            .range(start.to_string()..)
            .map(|(_, subscription)| subscription)
            .filter(|subscription| subscription.is_live(now))
            .filter(|subscription| match expires_before {
                Some(before) => subscription.expires_at.is_some_and(|at| at < before),
                None => true,
            })
            .take(limit.min(MAX_PAGE_SIZE))
            .map(|subscription| SubscriptionInfo {
                id: subscription.id.to_string(),
                query: subscription.raw_query.clone(),
                expires_at: subscription.expires_at,
            })
            .collect())
    }

    fn match_record(&self, topic: &str, record: &IndexRecord) -> Result<Vec<SubscriptionId>> {
        let now = Utc::now();
        let topics = self
            .topics
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("match topics"))?;
        let Some(subscriptions) = topics.get(topic) else {
            return Ok(Vec::new());
        };
        Ok(subscriptions
            .values()
            .filter(|subscription| subscription.is_live(now) && subscription.query.matches(record))
            .map(|subscription| subscription.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::path::Path;
    use crate::search::record::FieldType;

    fn record(path: &str, value: Value) -> IndexRecord {
        let Value::Object(doc) = value else {
            unreachable!()
        };
        IndexRecord::from_document(&Path::parse(path).expect("parse"), &doc)
    }

    fn schema() -> FieldSchema {
        FieldSchema::from([
            ("t".to_string(), FieldType::Text),
            ("n".to_string(), FieldType::Number),
        ])
    }

    fn id(endpoint: &str, query: &str) -> SubscriptionId {
        SubscriptionId::new(endpoint, "topic", query).expect("id")
    }

    #[test]
    fn matches_live_subscriptions_only() {
        let backend = MemoryMatchBackend::new();
        let hit = id("alice", "t:hello");
        let miss = id("alice", "t:bye");
        backend
            .subscribe("topic", &hit, 0, "t:hello", &schema())
            .expect("subscribe");
        backend
            .subscribe("topic", &miss, 60, "t:bye", &schema())
            .expect("subscribe");

        let matched = backend
            .match_record("topic", &record("/x", json!({"t": "Hello world"})))
            .expect("match");
        assert_eq!(matched, vec![hit.clone()]);
        assert!(
            backend
                .match_record("other", &record("/x", json!({"t": "hello"})))
                .expect("match")
                .is_empty()
        );

        backend
            .unsubscribe("topic", &hit.to_string())
            .expect("unsubscribe");
        backend.unsubscribe("topic", "unknown").expect("noop");
        assert!(
            backend
                .match_record("topic", &record("/x", json!({"t": "hello"})))
                .expect("match")
                .is_empty()
        );
    }

    #[test]
    fn subscribe_type_checks_field_filters() {
        let backend = MemoryMatchBackend::new();
        for query in ["unknown:x", "t>3", "n:abc", "(open"] {
            let err = backend
                .subscribe("topic", &id("e", query), 0, query, &schema())
                .expect_err("must fail");
            assert!(matches!(err, DataHubError::InvalidQuery(_)), "{query}");
        }
        backend
            .subscribe("topic", &id("e", "n>=2 free"), 0, "n>=2 free", &schema())
            .expect("valid");
    }

    #[test]
    fn list_starts_inclusive_and_filters_expiry() {
        let backend = MemoryMatchBackend::new();
        let forever = id("a", "q1");
        let soon = id("b", "q2");
        let later = id("c", "q3");
        backend
            .subscribe("topic", &forever, 0, "x", &schema())
            .expect("subscribe");
        backend
            .subscribe("topic", &soon, 60, "x", &schema())
            .expect("subscribe");
        backend
            .subscribe("topic", &later, 86_400, "x", &schema())
            .expect("subscribe");

        let all = backend
            .list_subscriptions("topic", "", 10, None)
            .expect("list");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, forever.to_string());
        assert!(all[0].expires_at.is_none());

        let from_b = backend
            .list_subscriptions("topic", &soon.to_string(), 10, None)
            .expect("list");
        assert_eq!(from_b[0].id, soon.to_string());
        assert_eq!(from_b.len(), 2);

        let expiring = backend
            .list_subscriptions("topic", "", 10, Some(Utc::now() + TimeDelta::hours(1)))
            .expect("list");
        assert_eq!(
            expiring.iter().map(|info| info.id.clone()).collect::<Vec<_>>(),
            vec![soon.to_string()]
        );

        let limited = backend
            .list_subscriptions("topic", "", 1, None)
            .expect("list");
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn expired_subscriptions_neither_match_nor_list() {
        let backend = MemoryMatchBackend::new();
        let sub = id("a", "x");
        backend
            .subscribe("topic", &sub, 0, "x", &schema())
            .expect("subscribe");
        {
            let mut topics = backend.topics.write().expect("lock");
            let entry = topics
                .get_mut("topic")
                .and_then(|subs| subs.get_mut(&sub.to_string()))
                .expect("entry");
            entry.expires_at = Some(Utc::now() - TimeDelta::seconds(1));
        }
        assert!(
            backend
                .match_record("topic", &record("/y", json!({"t": "x"})))
                .expect("match")
                .is_empty()
        );
        assert!(
            backend
                .list_subscriptions("topic", "", 10, None)
                .expect("list")
                .is_empty()
        );
    }

    fn expire(backend: &MemoryMatchBackend, sub: &SubscriptionId) {
        let mut topics = backend.topics.write().expect("lock");
        let entry = topics
            .get_mut("topic")
            .and_then(|subs| subs.get_mut(&sub.to_string()))
            .expect("entry");
        entry.expires_at = Some(Utc::now() - TimeDelta::seconds(1));
    }

    fn stored_ids(backend: &MemoryMatchBackend) -> Vec<String> {
        let topics = backend.topics.read().expect("lock");
        topics
            .get("topic")
            .map(|subs| subs.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn expired_subscriptions_are_reclaimed_on_write() {
        let backend = MemoryMatchBackend::new();
        let stale = id("a", "x");
        let other = id("b", "y");
        backend
            .subscribe("topic", &stale, 60, "x", &schema())
            .expect("subscribe");
        expire(&backend, &stale);

        backend
            .subscribe("topic", &other, 0, "y", &schema())
            .expect("subscribe");
        assert_eq!(stored_ids(&backend), vec![other.to_string()]);

        let again = id("c", "z");
        backend
            .subscribe("topic", &again, 60, "z", &schema())
            .expect("subscribe");
        expire(&backend, &again);
        backend.unsubscribe("topic", "unknown").expect("noop");
        assert_eq!(stored_ids(&backend), vec![other.to_string()]);
    }

    #[test]
    fn expiry_handles_zero_and_overflow() {
        let now = Utc::now();
        assert!(expiry(0, now).is_none());
        assert_eq!(expiry(10, now), Some(now + TimeDelta::seconds(10)));
        assert!(expiry(u64::MAX, now).is_none());
    }
}
