use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::json;

use crate::error::{DataHubError, Result};
use crate::models::{OutboxEvent, QueueEventStatus, TaskRunReport};
use crate::queue_policy::{BATCH_EVENT_TYPE, retry_backoff_seconds, should_retry_event};
use crate::state::SqliteStateStore;

/// Callback run for each batch enqueued under its registered name.
pub trait BatchProcessor: Send + Sync {
    fn process(&self, batch: &[String]) -> Result<()>;
}

impl<F> BatchProcessor for F
where
    F: Fn(&[String]) -> Result<()> + Send + Sync,
{
    fn process(&self, batch: &[String]) -> Result<()> {
        self(batch)
    }
}

/// Durable batch executor on top of the outbox table. Enqueueing returns
/// immediately; batches run on the next `run_pending` sweep.
pub struct TaskQueue {
    state: SqliteStateStore,
    processors: RwLock<HashMap<String, Arc<dyn BatchProcessor>>>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").finish_non_exhaustive()
    }
}

impl TaskQueue {
    #[must_use]
    pub fn new(state: SqliteStateStore) -> Self {
        Self {
            state,
            processors: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SqliteStateStore {
        &self.state
    }

    /// Registers `processor` under `name`, replacing any earlier one.
    pub fn register(&self, name: &str, processor: impl BatchProcessor + 'static) -> Result<()> {
        let mut processors = self
            .processors
            .write()
            .map_err(|_| DataHubError::mutex_poisoned("task processors"))?;
        processors.insert(name.to_string(), Arc::new(processor));
        tracing::debug!(processor = name, "registered batch processor");
        Ok(())
    }

    /// Splits `items` into batches of `batch_size` and enqueues one job per
    /// batch. Returns the number of batches.
    pub fn enqueue_process(
        &self,
        items: impl IntoIterator<Item = String>,
        batch_size: usize,
        processor: &str,
    ) -> Result<usize> {
        if batch_size == 0 {
            return Err(DataHubError::Validation(
                "batch size must be positive".to_string(),
            ));
        }
        let mut batches = 0;
        let mut batch = Vec::with_capacity(batch_size);
        for item in items {
            batch.push(item);
            if batch.len() == batch_size {
                self.enqueue_batch(processor, &batch)?;
                batches += 1;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.enqueue_batch(processor, &batch)?;
            batches += 1;
        }
        tracing::debug!(processor, batches, "enqueued batches");
        Ok(batches)
    }

    fn enqueue_batch(&self, processor: &str, batch: &[String]) -> Result<i64> {
        self.state
            .enqueue(BATCH_EVENT_TYPE, processor, json!({ "items": batch }))
    }

    /// Runs up to `limit` due batches.
    pub fn run_pending(&self, limit: usize) -> Result<TaskRunReport> {
        let events = self.state.fetch_outbox(QueueEventStatus::New, limit)?;
        let mut report = TaskRunReport {
            fetched: events.len(),
            ..TaskRunReport::default()
        };

        for event in events {
            self.state
                .mark_outbox_status(event.id, QueueEventStatus::Processing, true)?;
            let attempt = event.attempt_count.saturating_add(1);

            let Some(processor) = self.processor(&event.uri)? else {
                tracing::warn!(event_id = event.id, processor = %event.uri, "no processor registered");
                self.state
                    .mark_outbox_status(event.id, QueueEventStatus::DeadLetter, false)?;
                report.dead_lettered += 1;
                continue;
            };

            match batch_items(&event).and_then(|items| processor.process(&items)) {
                Ok(()) => {
                    self.state
                        .mark_outbox_status(event.id, QueueEventStatus::Done, false)?;
                    report.processed += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        event_id = event.id,
                        processor = %event.uri,
                        attempt,
                        error = %err,
                        "batch failed"
                    );
                    if should_retry_event(&event.event_type, attempt) {
                        self.state.requeue_outbox_with_delay(
                            event.id,
                            retry_backoff_seconds(&event.event_type, attempt, event.id),
                        )?;
                        report.retried += 1;
                    } else {
                        self.state
                            .mark_outbox_status(event.id, QueueEventStatus::DeadLetter, false)?;
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    fn processor(&self, name: &str) -> Result<Option<Arc<dyn BatchProcessor>>> {
        let processors = self
            .processors
            .read()
            .map_err(|_| DataHubError::mutex_poisoned("task processors"))?;
        Ok(processors.get(name).cloned())
    }
}

fn batch_items(event: &OutboxEvent) -> Result<Vec<String>> {
    let items = event
        .payload_json
        .get("items")
        .cloned()
        .ok_or_else(|| DataHubError::Internal(format!("batch {} has no items", event.id)))?;
    Ok(serde_json::from_value(items)?)
}
