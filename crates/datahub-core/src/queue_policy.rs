pub(crate) const BATCH_EVENT_TYPE: &str = "batch_process";

pub(crate) fn should_retry_event(event_type: &str, attempt: u32) -> bool {
    let max_attempts = match event_type {
        BATCH_EVENT_TYPE => 5,
        _ => 3,
    };
    attempt < max_attempts
}

pub(crate) fn retry_backoff_seconds(event_type: &str, attempt: u32, event_id: i64) -> i64 {
    let capped_exp = attempt.saturating_sub(1).min(6);
    let base = 1_i64 << capped_exp;
    let max = match event_type {
        BATCH_EVENT_TYPE => 60,
        _ => 30,
    };
    let baseline = base.min(max);
    let jitter_bound = (baseline / 4).max(1);
    let jitter_seed = format!("{event_type}:{attempt}:{event_id}");
    let hash = blake3::hash(jitter_seed.as_bytes());
    let bytes = hash.as_bytes();
    let rand = i64::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let jitter = rand % (jitter_bound + 1);
    (baseline + jitter).min(max)
}
