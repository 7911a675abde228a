use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{DataHubError, Result};

pub const DELIM: &str = "-->8--";

/// Endpoint owning the always-false seed subscription of every topic. The
/// leading space keeps it apart from caller endpoints, which must start with a
/// printable character.
pub const INTERNAL_ENDPOINT: &str = " INTERNAL__DEFAULT_SUBID";

/// `endpoint DELIM topic DELIM query`. Sorting ids groups them by endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId {
    endpoint: String,
    topic: String,
    query: String,
}

impl SubscriptionId {
    pub fn new(
        endpoint: impl Into<String>,
        topic: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        validate_endpoint(&endpoint)?;
        let topic = topic.into();
        if topic.is_empty() || topic.contains(DELIM) {
            return Err(DataHubError::InvalidSubscriptionId(format!(
                "bad topic({topic})"
            )));
        }
        Ok(Self {
            endpoint,
            topic,
            query: query.into(),
        })
    }

    #[must_use]
    pub fn internal(topic: &str, query: &str) -> Self {
        Self {
            endpoint: INTERNAL_ENDPOINT.to_string(),
            topic: topic.to_string(),
            query: query.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, DELIM);
        let (Some(endpoint), Some(topic)) = (parts.next(), parts.next()) else {
            return Err(DataHubError::InvalidSubscriptionId(raw.to_string()));
        };
        if endpoint.is_empty() || topic.is_empty() {
            return Err(DataHubError::InvalidSubscriptionId(raw.to_string()));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            topic: topic.to_string(),
            query: parts.next().unwrap_or_default().to_string(),
        })
    }

    /// Every id owned by `endpoint` starts with this string.
    pub fn endpoint_prefix(endpoint: &str) -> String {
        format!("{endpoint}{DELIM}")
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.endpoint == INTERNAL_ENDPOINT
    }
}

pub(crate) fn validate_endpoint(endpoint: &str) -> Result<()> {
    let printable_start = endpoint.chars().next().is_some_and(|c| c > ' ');
    if !printable_start || endpoint.contains(DELIM) {
        return Err(DataHubError::InvalidSubscriptionId(format!(
            "bad endpoint({endpoint})"
        )));
    }
    Ok(())
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{DELIM}{}{DELIM}{}", self.endpoint, self.topic, self.query)
    }
}

impl FromStr for SubscriptionId {
    type Err = DataHubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
