use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::sender::EventSender;

/// Counters the diagnostic worker reports each interval. Incremented from
/// wherever the corresponding thing happens (queue drop, flush attempt).
#[derive(Default)]
pub struct DiagnosticCounters {
    pub dropped_events: AtomicU64,
    pub events_in_last_batch: AtomicU64,
    pub deduplicated_contexts: AtomicU64,
}

pub struct DiagnosticId {
    pub diagnostic_id: Uuid,
    pub sdk_key_suffix: String,
}

pub fn init_event(id: &DiagnosticId, creation_date: i64, sdk_version: &str) -> serde_json::Value {
    json!({
        "kind": "diagnostic-init",
        "creationDate": creation_date,
        "id": {
            "diagnosticId": id.diagnostic_id,
            "sdkKeySuffix": id.sdk_key_suffix,
        },
        "sdk": { "name": "flagcore-server-sdk-rust", "version": sdk_version },
        "platform": { "name": "rust" },
    })
}

fn stats_event(id: &DiagnosticId, creation_date: i64, since: i64, counters: &DiagnosticCounters) -> serde_json::Value {
    json!({
        "kind": "diagnostic",
        "creationDate": creation_date,
        "id": {
            "diagnosticId": id.diagnostic_id,
            "sdkKeySuffix": id.sdk_key_suffix,
        },
        "dataSinceDate": since,
        "droppedEvents": counters.dropped_events.load(Ordering::Relaxed),
        "eventsInLastBatch": counters.events_in_last_batch.load(Ordering::Relaxed),
        "deduplicatedUsers": counters.deduplicated_contexts.load(Ordering::Relaxed),
    })
}

/// Spawns the periodic diagnostic-stats worker. Separate from the main
/// event queue: diagnostics are opt-out but never compete with feature/
/// custom events for queue capacity.
pub fn start(
    sender: EventSender,
    id: DiagnosticId,
    recording_interval: Duration,
    counters: Arc<DiagnosticCounters>,
    started_at_millis: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(recording_interval);
        interval.tick().await; // first tick fires immediately; diagnostic-init covers startup
        loop {
            interval.tick().await;
            let now = now_millis();
            let event = stats_event(&id, now, started_at_millis, &counters);
            if let Err(err) = sender.send(&[event]).await {
                tracing::debug!(error = %err, "failed to deliver diagnostic event");
            }
        }
    })
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
