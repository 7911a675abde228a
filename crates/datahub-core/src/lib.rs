// Public fallible APIs in this crate share one concrete error contract (`DataHubError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod acl;
pub mod composite;
pub mod config;
pub mod datastore;
pub mod document;
pub mod error;
pub mod hub;
pub mod keyed;
pub mod models;
pub mod path;
pub(crate) mod queue_policy;
pub mod search;
pub mod secure;
pub mod state;
pub mod subscription_id;
pub mod tasks;
pub mod user;

pub use acl::{AccessControl, AclRecord, ControlType, Op};
pub use composite::CompositeStore;
pub use config::{AppConfig, CorpusSpec};
pub use datastore::{Datastore, ListOptions};
pub use document::Document;
pub use error::{DataHubError, ErrorPayload, Result};
pub use hub::DataHub;
pub use path::Path;
pub use search::{SearchIndex, SearchRequest, SearchResponse};
pub use secure::SecureDatastore;
pub use subscription_id::SubscriptionId;
pub use user::User;
