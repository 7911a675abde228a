use std::path::PathBuf;

use crate::datastore::DEFAULT_LIMIT;
use crate::error::Result;
use crate::search::SearchSettings;

mod corpora;
mod env;

pub use corpora::CorpusSpec;

pub const ENV_STATE_PATH: &str = "DATAHUB_STATE_PATH";
pub const ENV_CORPORA: &str = "DATAHUB_CORPORA";
const ENV_MAX_SUBSCRIPTION_SECS: &str = "DATAHUB_MAX_SUBSCRIPTION_SECS";
const ENV_DEFAULT_LIMIT: &str = "DATAHUB_DEFAULT_LIMIT";
const ENV_INDEX_PAGE_SIZE: &str = "DATAHUB_INDEX_PAGE_SIZE";
const ENV_DELETE_BATCH_SIZE: &str = "DATAHUB_DELETE_BATCH_SIZE";
const ENV_TASK_POLL_MS: &str = "DATAHUB_TASK_POLL_MS";
const ENV_TASK_BATCHES_PER_POLL: &str = "DATAHUB_TASK_BATCHES_PER_POLL";

const DEFAULT_STATE_PATH: &str = "datahub_state.sqlite3";
const DEFAULT_TASK_POLL_MS: u64 = 500;
const DEFAULT_TASK_BATCHES_PER_POLL: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    pub poll_ms: u64,
    pub batches_per_poll: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            poll_ms: DEFAULT_TASK_POLL_MS,
            batches_per_poll: DEFAULT_TASK_BATCHES_PER_POLL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub state_path: PathBuf,
    /// Dependency order: every parent precedes its children.
    pub corpora: Vec<CorpusSpec>,
    pub default_limit: usize,
    pub search: SearchSettings,
    pub tasks: TaskConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            corpora: vec![CorpusSpec::root()],
            default_limit: DEFAULT_LIMIT,
            search: SearchSettings::default(),
            tasks: TaskConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `DATAHUB_*` variables. Numeric knobs fall back to their
    /// defaults; a malformed corpus list is an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let corpora = CorpusSpec::parse_list(env::read_non_empty_env(ENV_CORPORA).as_deref())?;
        Ok(Self {
            state_path: env::read_non_empty_env(ENV_STATE_PATH)
                .map_or(defaults.state_path, PathBuf::from),
            corpora,
            default_limit: env::read_env_usize(ENV_DEFAULT_LIMIT, defaults.default_limit, 1),
            search: SearchSettings {
                max_subscription_secs: env::read_env_u64(ENV_MAX_SUBSCRIPTION_SECS)
                    .unwrap_or(defaults.search.max_subscription_secs),
                page_size: env::read_env_usize(ENV_INDEX_PAGE_SIZE, defaults.search.page_size, 1),
                delete_batch_size: env::read_env_usize(
                    ENV_DELETE_BATCH_SIZE,
                    defaults.search.delete_batch_size,
                    1,
                ),
            },
            tasks: TaskConfig {
                poll_ms: env::read_env_u64(ENV_TASK_POLL_MS)
                    .filter(|value| *value > 0)
                    .unwrap_or(defaults.tasks.poll_ms),
                batches_per_poll: env::read_env_usize(
                    ENV_TASK_BATCHES_PER_POLL,
                    defaults.tasks.batches_per_poll,
                    1,
                ),
            },
        })
    }

    #[must_use]
    pub fn with_state_path(mut self, state_path: impl Into<PathBuf>) -> Self {
        self.state_path = state_path.into();
        self
    }
}
