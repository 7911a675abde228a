use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventStatus {
    New,
    Processing,
    Done,
    DeadLetter,
}

impl QueueEventStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::DeadLetter => "dead_letter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_type: String,
    pub uri: String,
    pub payload_json: serde_json::Value,
    pub status: String,
    pub attempt_count: u32,
    pub next_attempt_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub new_total: u64,
    pub new_due: u64,
    pub processing: u64,
    pub done: u64,
    pub dead_letter: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_next_attempt_at: Option<String>,
}

/// Outcome of one `TaskQueue::run_pending` sweep.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TaskRunReport {
    pub fetched: usize,
    pub processed: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

/// Names of the backing index and subscription topic of one corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMap {
    pub index: String,
    pub topic: String,
}
