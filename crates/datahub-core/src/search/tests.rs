use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde_json::{Value, json};

use super::*;
use crate::state::SqliteStateStore;

struct Fixture {
    registry: CorpusRegistry,
    services: SearchServices,
    inbox: Arc<EndpointInbox>,
}

fn fixture() -> Fixture {
    let tasks = Arc::new(TaskQueue::new(
        SqliteStateStore::open_in_memory().expect("open"),
    ));
    let inbox = Arc::new(EndpointInbox::new());
    let services = SearchServices::in_memory(
        tasks,
        Arc::clone(&inbox) as Arc<dyn MatchSink>,
        SearchSettings {
            page_size: 2,
            delete_batch_size: 3,
            ..SearchSettings::default()
        },
    );
    Fixture {
        registry: CorpusRegistry::new(),
        services,
        inbox,
    }
}

impl Fixture {
    fn corpus(&self, raw: &str, parent: Option<&str>) -> Arc<SearchIndex> {
        let parent = parent.map(path);
        self.registry
            .register(path(raw), parent.as_ref(), self.services.clone())
            .expect("register")
    }
}

fn path(raw: &str) -> Path {
    Path::parse(raw).expect("parse")
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn query(raw: &str) -> SearchRequest {
    SearchRequest {
        query: raw.to_string(),
        ..SearchRequest::default()
    }
}

fn hit_paths(response: &SearchResponse) -> Vec<String> {
    response
        .results
        .iter()
        .flat_map(|entry| entry.keys().cloned())
        .collect()
}

#[test]
fn register_enforces_order_and_uniqueness() {
    let fx = fixture();
    let err = fx
        .registry
        .register(path("/docs"), Some(&Path::root()), fx.services.clone())
        .expect_err("must fail");
    assert!(matches!(err, DataHubError::UnknownParentCorpus { .. }));

    fx.corpus("/", None);
    let err = fx
        .registry
        .register(Path::root(), None, fx.services.clone())
        .expect_err("must fail");
    assert!(matches!(err, DataHubError::Conflict(_)));

    fx.corpus("/docs", Some("/"));
    fx.corpus("/other", None);
    let err = fx
        .registry
        .register(path("/docs/x"), Some(&path("/other")), fx.services.clone())
        .expect_err("must fail");
    assert!(matches!(err, DataHubError::Validation(_)));
}

#[test]
fn deepest_containing_prefers_the_closest_corpus() {
    let fx = fixture();
    fx.corpus("/", None);
    fx.corpus("/docs", Some("/"));
    let found = |raw: &str| {
        fx.registry
            .deepest_containing(&path(raw))
            .expect("lookup")
            .map(|index| index.corpus().to_string())
    };
    assert_eq!(found("/docs/a/b").as_deref(), Some("/docs"));
    assert_eq!(found("/docs").as_deref(), Some("/docs"));
    assert_eq!(found("/elsewhere").as_deref(), Some("/"));
    assert_eq!(
        fx.registry.corpora().expect("corpora"),
        vec![Path::root(), path("/docs")]
    );
}

#[test]
fn create_outside_the_corpus_is_rejected() {
    let fx = fixture();
    let docs = fx.corpus("/docs", None);
    for raw in ["/other/a", "/docs", "/"] {
        let err = docs
            .create(&path(raw), &Document::new())
            .expect_err("must fail");
        assert!(matches!(err, DataHubError::InvalidSubPath { .. }), "{raw}");
    }
}

#[test]
fn created_documents_cascade_to_parent_corpora() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let docs = fx.corpus("/docs", Some("/"));
    let user = User::anonymous();

    docs.create(&path("/docs/a"), &doc(json!({"t": "hello world"})))
        .expect("create");

    let in_child = docs
        .search(&path("/docs"), &query("hello"), &user)
        .expect("search child");
    assert_eq!(hit_paths(&in_child), vec!["/docs/a"]);
    assert_eq!(in_child.results[0]["/docs/a"], json!({"t": "hello world"}));

    let in_root = root
        .search(&Path::root(), &query("hello"), &user)
        .expect("search root");
    assert_eq!(hit_paths(&in_root), vec!["/docs/a"]);

    let elsewhere = root
        .search(&path("/other"), &query("hello"), &user)
        .expect("search other");
    assert!(elsewhere.results.is_empty());

    root.create(&path("/top"), &doc(json!({"t": "hello"})))
        .expect("create at root");
    let child_only = docs
        .search(&path("/docs"), &query("hello"), &user)
        .expect("search child");
    assert_eq!(hit_paths(&child_only), vec!["/docs/a"]);
}

#[test]
fn search_scopes_to_subtree_and_pages() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::anonymous();
    for name in ["a", "b", "c"] {
        root.create(&path(&format!("/x/{name}")), &doc(json!({"kind": "note"})))
            .expect("create");
    }
    root.create(&path("/y/d"), &doc(json!({"kind": "note"})))
        .expect("create");

    let all = root
        .search(&path("/x"), &query(""), &user)
        .expect("search");
    assert_eq!(hit_paths(&all), vec!["/x/a", "/x/b", "/x/c"]);
    assert_eq!(all.limit, DEFAULT_LIMIT);
    assert!(all.subscription_id.is_none());

    let page = root
        .search(
            &path("/x"),
            &SearchRequest {
                offset: 1,
                limit: 1,
                ..query("note")
            },
            &user,
        )
        .expect("page");
    assert_eq!(hit_paths(&page), vec!["/x/b"]);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, 1);

    let either = root
        .search(&Path::root(), &query("kind:note OR missing"), &user)
        .expect("or");
    assert_eq!(either.results.len(), 4);
}

#[test]
fn standing_query_is_registered_before_results_and_receives_matches() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::new("alice");
    let response = root
        .search(
            &Path::root(),
            &SearchRequest {
                endpoint: Some("alice".to_string()),
                duration: 60,
                ..query("urgent")
            },
            &user,
        )
        .expect("search");
    let subscription_id = response.subscription_id.expect("subscribed");
    assert!(subscription_id.starts_with("alice-->8--ROOT-->8--"));

    root.create(&path("/inbox/1"), &doc(json!({"t": "urgent call"})))
        .expect("create");
    root.create(&path("/inbox/2"), &doc(json!({"t": "later"})))
        .expect("create");

    let messages = fx.inbox.drain("alice").expect("drain");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].path, "/inbox/1");
    assert_eq!(messages[0].subscription_ids, vec![subscription_id]);
    assert_eq!(messages[0].object, doc(json!({"t": "urgent call"})));
}

#[test]
fn negative_duration_or_missing_endpoint_does_not_subscribe() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::new("alice");
    let no_endpoint = root
        .search(
            &Path::root(),
            &SearchRequest {
                duration: 60,
                ..query("x")
            },
            &user,
        )
        .expect("search");
    assert!(no_endpoint.subscription_id.is_none());
    let negative = root
        .search(
            &Path::root(),
            &SearchRequest {
                endpoint: Some("alice".to_string()),
                ..query("x")
            },
            &user,
        )
        .expect("search");
    assert!(negative.subscription_id.is_none());
    assert!(
        root.retrieve_queries("alice", 10, None)
            .expect("queries")
            .is_empty()
    );
}

#[test]
fn subscription_lifetime_is_clamped() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::new("alice");
    let subscribe = |duration| {
        root.search(
            &Path::root(),
            &SearchRequest {
                endpoint: Some("alice".to_string()),
                duration,
                ..query(&format!("d{duration}"))
            },
            &user,
        )
        .expect("search")
    };
    subscribe(10_000_000);
    subscribe(0);

    let queries = root.retrieve_queries("alice", 10, None).expect("queries");
    assert_eq!(queries.len(), 2);
    let bound = Utc::now() + TimeDelta::seconds(3601);
    for info in &queries {
        if info.query.contains("d0") {
            assert!(info.expires_at.is_none());
        } else {
            assert!(info.expires_at.is_some_and(|at| at <= bound));
        }
    }
}

#[test]
fn standing_query_field_filters_are_type_checked() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    root.create(&path("/a"), &doc(json!({"n": 3, "t": "x"})))
        .expect("create");
    let user = User::new("alice");
    let standing = |raw: &str| SearchRequest {
        endpoint: Some("alice".to_string()),
        duration: 0,
        ..query(raw)
    };

    root.search(&Path::root(), &standing("n>2"), &user)
        .expect("number range");
    for raw in ["t>2", "unknown:1"] {
        let err = root
            .search(&Path::root(), &standing(raw), &user)
            .expect_err("must fail");
        assert!(matches!(err, DataHubError::InvalidQuery(_)), "{raw}");
    }
    let plain = root
        .search(&Path::root(), &query("unknown:1"), &user)
        .expect("snapshot search is not type checked");
    assert!(plain.results.is_empty());
}

#[test]
fn delete_cascades_to_parent_corpora() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let docs = fx.corpus("/docs", Some("/"));
    let user = User::anonymous();
    docs.create(&path("/docs/a"), &doc(json!({"t": "x"})))
        .expect("create");
    docs.delete(&user, &[path("/docs/a")]).expect("delete");
    assert!(
        root.search(&Path::root(), &query("x"), &user)
            .expect("search")
            .results
            .is_empty()
    );
    assert!(
        docs.search(&path("/docs"), &query("x"), &user)
            .expect("search")
            .results
            .is_empty()
    );
}

#[test]
fn delete_indexes_pages_and_runs_asynchronously() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::new("alice");
    for i in 0..5 {
        root.create(&path(&format!("/n/{i}")), &doc(json!({"t": "x"})))
            .expect("create");
    }
    for endpoint in ["alice", "bob"] {
        root.search(
            &Path::root(),
            &SearchRequest {
                endpoint: Some(endpoint.to_string()),
                duration: 0,
                ..query("x")
            },
            &user,
        )
        .expect("subscribe");
    }

    let batches = root.delete_indexes().expect("wipe");
    assert_eq!(batches, 3);
    assert_eq!(
        root.search(&Path::root(), &query("x"), &user)
            .expect("search")
            .results
            .len(),
        5,
        "nothing is deleted before the queue runs"
    );

    let report = fx.services.tasks.run_pending(100).expect("run");
    assert_eq!(report.processed, 3);
    assert!(
        root.search(&Path::root(), &query("x"), &user)
            .expect("search")
            .results
            .is_empty()
    );
    let remaining = fx
        .services
        .matcher
        .list_subscriptions(&root.index_map().topic, "", 10, None)
        .expect("list");
    assert_eq!(remaining.len(), 1);
    assert!(
        SubscriptionId::parse(&remaining[0].id)
            .expect("parse")
            .is_internal()
    );
}

#[test]
fn delete_queries_unsubscribes_but_keeps_the_seed() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::new("alice");
    let id = root
        .search(
            &Path::root(),
            &SearchRequest {
                endpoint: Some("alice".to_string()),
                duration: 0,
                ..query("x")
            },
            &user,
        )
        .expect("subscribe")
        .subscription_id
        .expect("id");

    let seed = SubscriptionId::internal(&root.index_map().topic, UNSATISFIABLE_QUERY);
    let err = root
        .delete_queries(&[seed.to_string()])
        .expect_err("must fail");
    assert!(matches!(err, DataHubError::Validation(_)));
    let err = root
        .delete_queries(&["garbage".to_string()])
        .expect_err("must fail");
    assert!(matches!(err, DataHubError::InvalidSubscriptionId(_)));

    root.delete_queries(std::slice::from_ref(&id))
        .expect("delete");
    assert!(
        root.retrieve_queries("alice", 10, None)
            .expect("queries")
            .is_empty()
    );
}

#[test]
fn delete_queries_follows_the_topic_in_the_id() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let docs = fx.corpus("/docs", Some("/"));
    let user = User::new("bob");
    let id = docs
        .search(
            &path("/docs"),
            &SearchRequest {
                endpoint: Some("bob".to_string()),
                duration: 0,
                ..query("seed")
            },
            &user,
        )
        .expect("subscribe")
        .subscription_id
        .expect("id");

    root.delete_queries(std::slice::from_ref(&id))
        .expect("delete");
    assert!(
        docs.retrieve_queries("bob", 10, None)
            .expect("queries")
            .is_empty()
    );
    docs.create(&path("/docs/a"), &doc(json!({"t": "seed"})))
        .expect("create");
    assert!(fx.inbox.drain("bob").expect("drain").is_empty());
}

#[test]
fn response_echoes_the_requested_limit() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    root.create(&path("/x/a"), &doc(json!({"t": "one"})))
        .expect("create");
    let response = root
        .search(
            &Path::root(),
            &SearchRequest {
                limit: 5,
                ..query("one")
            },
            &User::anonymous(),
        )
        .expect("search");
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.limit, 5);
}

#[test]
fn retrieve_queries_is_scoped_to_the_endpoint() {
    let fx = fixture();
    let root = fx.corpus("/", None);
    let user = User::anonymous();
    for endpoint in ["alice", "alicex", "bob"] {
        root.search(
            &Path::root(),
            &SearchRequest {
                endpoint: Some(endpoint.to_string()),
                duration: 0,
                ..query("x")
            },
            &user,
        )
        .expect("subscribe");
    }
    let alice = root.retrieve_queries("alice", 10, None).expect("queries");
    assert_eq!(alice.len(), 1);
    assert!(alice[0].id.starts_with("alice-->8--"));
    let err = root
        .retrieve_queries(" bad", 10, None)
        .expect_err("must fail");
    assert!(matches!(err, DataHubError::InvalidSubscriptionId(_)));
}

#[test]
fn index_map_names_index_and_topic_by_doc_id() {
    let fx = fixture();
    let docs = fx.corpus("/docs", None);
    let map = docs.index_map();
    assert_eq!(map.index, "ROOTdocs");
    assert_eq!(map.topic, "ROOTdocs");
}

#[test]
fn scoped_query_wraps_the_caller_query() {
    assert_eq!(
        scoped_query(&path("/a"), "  "),
        "INTERNAL__QUERY__FIELD__path:ROOTa"
    );
    assert_eq!(
        scoped_query(&path("/a"), "x OR y"),
        "INTERNAL__QUERY__FIELD__path:ROOTa AND (x OR y)"
    );
}
