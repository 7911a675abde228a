use std::sync::Arc;

use crate::acl::AccessControl;
use crate::composite::CompositeStore;
use crate::config::AppConfig;
use crate::datastore::Datastore;
use crate::error::{DataHubError, Result};
use crate::keyed::KeyedStore;
use crate::models::TaskRunReport;
use crate::path::Path;
use crate::search::{CorpusRegistry, EndpointInbox, SearchServices};
use crate::secure::SecureDatastore;
use crate::state::SqliteStateStore;
use crate::tasks::TaskQueue;

/// Everything one process serves: the primary store, the configured corpora
/// and the shared task queue and match inbox.
#[derive(Debug)]
pub struct DataHub {
    config: AppConfig,
    secure: SecureDatastore,
    registry: CorpusRegistry,
    tasks: Arc<TaskQueue>,
    inbox: Arc<EndpointInbox>,
}

impl DataHub {
    pub fn open(config: AppConfig) -> Result<Self> {
        let state = SqliteStateStore::open(&config.state_path)?;
        Self::with_state(config, state)
    }

    pub fn open_in_memory(config: AppConfig) -> Result<Self> {
        Self::with_state(config, SqliteStateStore::open_in_memory()?)
    }

    fn with_state(config: AppConfig, state: SqliteStateStore) -> Result<Self> {
        let recovered = state.recover_processing_events()?;
        if recovered > 0 {
            tracing::info!(recovered, "requeued interrupted batches");
        }

        let keyed: Arc<dyn KeyedStore> = Arc::new(state.clone());
        let secure = SecureDatastore::new(
            Datastore::new(Arc::clone(&keyed))?,
            AccessControl::new(keyed),
        );
        let tasks = Arc::new(TaskQueue::new(state));
        let inbox = Arc::new(EndpointInbox::new());
        let services = SearchServices::in_memory(
            Arc::clone(&tasks),
            Arc::clone(&inbox) as Arc<dyn crate::search::MatchSink>,
            config.search,
        );

        let registry = CorpusRegistry::new();
        for spec in &config.corpora {
            registry.register(spec.path.clone(), spec.parent.as_ref(), services.clone())?;
        }
        tracing::info!(
            corpora = config.corpora.len(),
            state_path = %config.state_path.display(),
            "data hub ready"
        );

        Ok(Self {
            config,
            secure,
            registry,
            tasks,
            inbox,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn acl(&self) -> &AccessControl {
        self.secure.acl()
    }

    #[must_use]
    pub const fn tasks(&self) -> &Arc<TaskQueue> {
        &self.tasks
    }

    #[must_use]
    pub const fn inbox(&self) -> &Arc<EndpointInbox> {
        &self.inbox
    }

    /// Store of the deepest corpus containing `path`.
    pub fn store_for(&self, path: &Path) -> Result<CompositeStore> {
        let index = self
            .registry
            .deepest_containing(path)?
            .ok_or_else(|| DataHubError::NotFound(format!("no corpus contains {path}")))?;
        Ok(CompositeStore::new(self.secure.clone(), index))
    }

    /// One sweep of the task queue, bounded by the configured batch count.
    pub fn run_pending_tasks(&self) -> Result<TaskRunReport> {
        self.tasks.run_pending(self.config.tasks.batches_per_poll)
    }
}
