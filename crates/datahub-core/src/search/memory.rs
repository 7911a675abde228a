use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{DataHubError, Result};

use super::backend::{ScoredHit, SearchBackend};
use super::query::Query;
use super::record::{FieldValue, IndexRecord, tokenize};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Largest page any single `search` or `list_ids` call returns.
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug)]
struct StoredRecord {
    record: IndexRecord,
    term_freq: HashMap<String, u32>,
    doc_len: usize,
}

impl StoredRecord {
    fn new(record: IndexRecord) -> Self {
        let mut term_freq = HashMap::new();
        let mut doc_len = 0;
        for value in record.fields.values() {
            if let FieldValue::Text(text) = value {
                for token in tokenize(text) {
                    *term_freq.entry(token).or_insert(0) += 1;
                    doc_len += 1;
                }
            }
        }
        Self {
            record,
            term_freq,
            doc_len,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySearchBackend {
    indexes: RwLock<HashMap<String, BTreeMap<String, StoredRecord>>>,
}

impl MemorySearchBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, index: &str) -> Result<usize> {
        let indexes = self
            .indexes
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("search index"))?;
        Ok(indexes.get(index).map_or(0, BTreeMap::len))
    }
}

impl SearchBackend for MemorySearchBackend {
    fn add(&self, index: &str, record: IndexRecord) -> Result<()> {
        let mut indexes = self
            .indexes
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("search index"))?;
        indexes
            .entry(index.to_string())
            .or_default()
            .insert(record.id.clone(), StoredRecord::new(record));
        Ok(())
    }

    fn remove(&self, index: &str, ids: &[String]) -> Result<()> {
        let mut indexes = self
            .indexes
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("search index"))?;
        if let Some(records) = indexes.get_mut(index) {
            for id in ids {
                records.remove(id);
            }
        }
        Ok(())
    }

    fn search(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ScoredHit>> {
        let parsed = Query::parse(query)?;
        let indexes = self
            .indexes
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("search index"))?;
        let Some(records) = indexes.get(index) else {
            return Ok(Vec::new());
        };

        let corpus = CorpusStats::collect(records);
        let terms = parsed.positive_terms();
        let mut hits = records
            .values()
            .filter(|stored| parsed.matches(&stored.record))
            .map(|stored| ScoredHit {
                id: stored.record.id.clone(),
                path: stored.record.path.clone(),
                object: stored.record.object.clone(),
                score: bm25_score(&terms, stored, &corpus),
            })
            .collect::<Vec<_>>();
        hits.sort_by(score_ordering);
        Ok(hits
            .into_iter()
            .skip(offset)
            .take(limit.min(MAX_PAGE_SIZE))
            .collect())
    }

    fn list_ids(
        &self,
        index: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let indexes = self
            .indexes
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("search index"))?;
        let Some(records) = indexes.get(index) else {
            return Ok(Vec::new());
        };
        Ok(records
            .keys()
            .filter(|id| start_after.is_none_or(|after| id.as_str() > after))
            .take(limit.min(MAX_PAGE_SIZE))
            .cloned()
            .collect())
    }
}

fn score_ordering(a: &ScoredHit, b: &ScoredHit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

struct CorpusStats {
    doc_freqs: HashMap<String, usize>,
    total_docs: usize,
    avg_doc_len: f64,
}

impl CorpusStats {
    fn collect(records: &BTreeMap<String, StoredRecord>) -> Self {
        let mut doc_freqs = HashMap::new();
        let mut total_len = 0;
        for stored in records.values() {
            total_len += stored.doc_len;
            for token in stored.term_freq.keys() {
                *doc_freqs.entry(token.clone()).or_insert(0) += 1;
            }
        }
        let total_docs = records.len();
        let avg_doc_len = if total_docs == 0 {
            0.0
        } else {
            usize_to_f64(total_len) / usize_to_f64(total_docs)
        };
        Self {
            doc_freqs,
            total_docs,
            avg_doc_len,
        }
    }
}

fn bm25_score(terms: &[String], stored: &StoredRecord, corpus: &CorpusStats) -> f64 {
    if terms.is_empty() || stored.doc_len == 0 || corpus.total_docs == 0 {
        return 0.0;
    }
    let n = usize_to_f64(corpus.total_docs);
    let length_norm = BM25_B.mul_add(
        usize_to_f64(stored.doc_len) / corpus.avg_doc_len.max(1.0),
        1.0 - BM25_B,
    );
    let mut score = 0.0;
    let mut seen = HashSet::new();
    for term in terms {
        if !seen.insert(term) {
            continue;
        }
        let Some(tf) = stored.term_freq.get(term) else {
            continue;
        };
        let df = usize_to_f64(corpus.doc_freqs.get(term).copied().unwrap_or(0));
        let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p().max(0.0);
        let tf = f64::from(*tf);
        let denom = BM25_K1.mul_add(length_norm, tf);
        if denom > 0.0 {
            score += idf * (tf * (BM25_K1 + 1.0) / denom);
        }
    }
    score
}

#[allow(clippy::cast_precision_loss)]
const fn usize_to_f64(value: usize) -> f64 {
    value as f64
}
