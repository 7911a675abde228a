use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{DataHubError, Result};

/// One matched record for one endpoint, listing every subscription of that
/// endpoint the record satisfied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMessage {
    pub endpoint: String,
    pub path: String,
    pub object: Document,
    pub subscription_ids: Vec<String>,
}

pub trait MatchSink: Send + Sync {
    fn deliver(&self, message: MatchMessage) -> Result<()>;
}

/// Per-endpoint mailbox held in memory until the endpoint drains it.
#[derive(Debug, Default)]
pub struct EndpointInbox {
    messages: Mutex<HashMap<String, Vec<MatchMessage>>>,
}

impl EndpointInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self, endpoint: &str) -> Result<Vec<MatchMessage>> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| DataHubError::mutex_poisoned("endpoint inbox"))?;
        Ok(messages.remove(endpoint).unwrap_or_default())
    }
}

impl MatchSink for EndpointInbox {
    fn deliver(&self, message: MatchMessage) -> Result<()> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| DataHubError::mutex_poisoned("endpoint inbox"))?;
        messages
            .entry(message.endpoint.clone())
            .or_default()
            .push(message);
        Ok(())
    }
}
