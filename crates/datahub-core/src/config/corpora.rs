use crate::error::{DataHubError, Result};
use crate::path::Path;

use super::ENV_CORPORA;

/// One configured corpus and the corpus it cascades into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSpec {
    pub path: Path,
    pub parent: Option<Path>,
}

impl CorpusSpec {
    #[must_use]
    pub fn root() -> Self {
        Self {
            path: Path::root(),
            parent: None,
        }
    }

    /// Parses `path[=parent],...`. Unset means a single ROOT corpus.
    pub(crate) fn parse_list(raw: Option<&str>) -> Result<Vec<Self>> {
        let Some(raw) = raw else {
            return Ok(vec![Self::root()]);
        };
        let specs = raw
            .split(',')
            .map(Self::parse_entry)
            .collect::<Result<Vec<_>>>()?;
        if specs.is_empty() {
            return Err(invalid(raw));
        }
        Ok(specs)
    }

    fn parse_entry(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(invalid(entry));
        }
        let (path, parent) = match entry.split_once('=') {
            Some((path, parent)) => (path, Some(parent)),
            None => (entry, None),
        };
        let path = Path::parse(path).map_err(|_| invalid(entry))?;
        let parent = parent
            .map(|raw| Path::parse(raw).map_err(|_| invalid(entry)))
            .transpose()?;
        Ok(Self { path, parent })
    }
}

fn invalid(raw: &str) -> DataHubError {
    DataHubError::Validation(format!(
        "invalid {ENV_CORPORA}: {raw:?} (expected path[=parent],...)"
    ))
}
