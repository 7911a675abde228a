use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{DataHubError, Result};
use crate::path::Path;

use super::{SearchIndex, SearchServices};

/// Corpora by path. Parents must be registered before their children.
#[derive(Debug, Default)]
pub struct CorpusRegistry {
    corpora: RwLock<BTreeMap<Path, Arc<SearchIndex>>>,
}

impl CorpusRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index for `corpus`, chained to the already registered
    /// `parent` corpus, which must be a strict ancestor.
    pub fn register(
        &self,
        corpus: Path,
        parent: Option<&Path>,
        services: SearchServices,
    ) -> Result<Arc<SearchIndex>> {
        let mut corpora = self
            .corpora
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("corpus registry"))?;
        if corpora.contains_key(&corpus) {
            return Err(DataHubError::Conflict(format!(
                "corpus({corpus}) is already registered"
            )));
        }
        let parent_index = match parent {
            Some(parent) => {
                let index = corpora.get(parent).cloned().ok_or_else(|| {
                    DataHubError::UnknownParentCorpus {
                        parent: parent.to_string(),
                        corpus: corpus.to_string(),
                    }
                })?;
                if !parent.is_parent_of(&corpus) {
                    return Err(DataHubError::Validation(format!(
                        "parent corpus({parent}) does not contain corpus({corpus})"
                    )));
                }
                Some(index)
            }
            None => None,
        };

        let index = Arc::new(SearchIndex::new(corpus.clone(), parent_index, services)?);
        corpora.insert(corpus.clone(), Arc::clone(&index));
        tracing::info!(corpus = %corpus, parent = ?parent.map(ToString::to_string), "registered corpus");
        Ok(index)
    }

    /// The corpus at `path` or at its closest registered ancestor.
    pub fn deepest_containing(&self, path: &Path) -> Result<Option<Arc<SearchIndex>>> {
        let corpora = self
            .corpora
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("corpus registry"))?;
        Ok(path
            .lineage()
            .iter()
            .find_map(|ancestor| corpora.get(ancestor).cloned()))
    }

    pub fn corpora(&self) -> Result<Vec<Path>> {
        let corpora = self
            .corpora
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("corpus registry"))?;
        Ok(corpora.keys().cloned().collect())
    }
}
