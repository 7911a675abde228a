use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use datahub_core::{DataHubError, Document, Op, Result};

/// Decoded query string. Names may repeat (`queryId=a&queryId=b`).
#[derive(Debug, Default)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .map(|(name, value)| (name.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|(key, _)| key == name)
    }

    pub fn all(&self, name: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn usize_or(&self, name: &str, default_value: usize) -> Result<usize> {
        self.get(name).map_or(Ok(default_value), |raw| {
            raw.trim()
                .parse()
                .map_err(|_| invalid_param(name, raw))
        })
    }

    pub fn i64_or(&self, name: &str, default_value: i64) -> Result<i64> {
        self.get(name).map_or(Ok(default_value), |raw| {
            raw.trim()
                .parse()
                .map_err(|_| invalid_param(name, raw))
        })
    }

    pub fn op(&self) -> Result<Op> {
        self.get("op")
            .ok_or_else(|| DataHubError::Validation("missing parameter: op".to_string()))?
            .parse()
    }

    /// RFC 3339 timestamp.
    pub fn time(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        self.get(name)
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|_| invalid_param(name, raw))
            })
            .transpose()
    }
}

fn invalid_param(name: &str, raw: &str) -> DataHubError {
    DataHubError::Validation(format!("invalid parameter {name}: {raw:?}"))
}

/// Request body as a document; an empty body is the empty document.
pub fn parse_document(body: &[u8]) -> Result<Document> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(DataHubError::Validation(
            "request body must be a JSON object".to_string(),
        )),
        Err(err) => Err(DataHubError::Validation(format!(
            "request body is not valid JSON: {err}"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct AclStatusResponse {
    pub path: String,
    pub user: String,
    pub op: Op,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub batches: usize,
}
