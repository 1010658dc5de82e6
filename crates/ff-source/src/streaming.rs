use std::sync::Arc;
use std::time::{Duration, Instant};

use ff_store::{DataStore, UpdateSink};
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::backoff::ReconnectBackoff;
use crate::error::DataSourceErrorInfo;
use crate::payload::{delete_to_item, parse_path, patch_to_item, DeletePayload, PatchPayload, PutPayload};
use crate::status::{HealthTracker, StatusTracker, StatusTrackerHandle, HEALTHY_RESET_THRESHOLD};

pub struct StreamingConfig {
    pub stream_base_url: String,
    pub sdk_key: String,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

pub struct StreamingSource {
    pub handle: JoinHandle<()>,
    pub status: StatusTrackerHandle,
    pub ready: oneshot::Receiver<bool>,
}

impl StreamingSource {
    pub fn start<S: DataStore + 'static>(config: StreamingConfig, sink: Arc<UpdateSink<S>>) -> StreamingSource {
        let (tracker, handle, ready) = StatusTracker::new(now_millis());
        let join = tokio::spawn(run(config, sink, tracker));
        StreamingSource {
            handle: join,
            status: handle,
            ready,
        }
    }
}

async fn run<S: DataStore + 'static>(config: StreamingConfig, sink: Arc<UpdateSink<S>>, mut tracker: StatusTracker) {
    let http = reqwest::Client::new();
    let mut backoff = ReconnectBackoff::new(config.initial_retry_delay, config.max_retry_delay);
    let mut health = HealthTracker::new();

    loop {
        tracing::debug!(url = %config.stream_base_url, "connecting to streaming endpoint");
        match connect_once(&http, &config, &sink, &mut tracker, &mut health).await {
            Ok(()) => {}
            Err(info) => {
                health.note_failure();
                let unrecoverable = info.recoverability() == crate::error::Recoverability::Unrecoverable;
                tracker.on_error(info, now_millis());
                if unrecoverable {
                    tracing::error!("streaming source received an unrecoverable error, stopping");
                    return;
                }
            }
        }

        let delay = if health.has_been_healthy_for(Instant::now(), HEALTHY_RESET_THRESHOLD) {
            backoff.reset();
            backoff.next_delay()
        } else {
            backoff.next_delay()
        };
        tracing::debug!(?delay, "reconnecting after delay");
        tokio::time::sleep(delay).await;
    }
}

async fn connect_once<S: DataStore>(
    http: &reqwest::Client,
    config: &StreamingConfig,
    sink: &Arc<UpdateSink<S>>,
    tracker: &mut StatusTracker,
    health: &mut HealthTracker,
) -> Result<(), DataSourceErrorInfo> {
    let url = format!("{}/all", config.stream_base_url.trim_end_matches('/'));
    let response = http
        .get(&url)
        .header("Authorization", &config.sdk_key)
        .send()
        .await
        .map_err(|e| DataSourceErrorInfo::network(e.to_string(), now_millis()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        return Err(DataSourceErrorInfo::http(status, response.status().to_string(), now_millis()));
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| DataSourceErrorInfo::network(e.to_string(), now_millis()))?;
        buffer.push_str(&String::from_utf8_lossy(&bytes));

        for event in drain_events(&mut buffer) {
            if let Err(err) = dispatch_event(&event, sink) {
                tracing::warn!(error = %err, "dropping malformed streaming payload");
                continue;
            }
            tracker.on_success(now_millis());
            health.note_success(Instant::now());
        }
    }

    Err(DataSourceErrorInfo::network("stream closed by server", now_millis()))
}

struct SseEvent {
    event: String,
    data: String,
}

fn drain_events(buffer: &mut String) -> Vec<SseEvent> {
    let mut events = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();
        let mut event_name = String::from("message");
        let mut data_lines = Vec::new();
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event_name = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.trim().to_string());
            }
        }
        if !data_lines.is_empty() {
            events.push(SseEvent {
                event: event_name,
                data: data_lines.join("\n"),
            });
        }
    }
    events
}

fn dispatch_event<S: DataStore>(event: &SseEvent, sink: &Arc<UpdateSink<S>>) -> Result<(), crate::error::SourceError> {
    match event.event.as_str() {
        "put" => {
            let payload: PutPayload = serde_json::from_str(&event.data)
                .map_err(|e| crate::error::SourceError::MalformedPayload(e.to_string()))?;
            sink.init(payload.data.into());
            Ok(())
        }
        "patch" => {
            let payload: PatchPayload = serde_json::from_str(&event.data)
                .map_err(|e| crate::error::SourceError::MalformedPayload(e.to_string()))?;
            let (kind, _key) = parse_path(&payload.path)?;
            let item = patch_to_item(kind, payload.data)?;
            let key = item.key().to_string();
            sink.upsert(kind, &key, item)?;
            Ok(())
        }
        "delete" => {
            let payload: DeletePayload = serde_json::from_str(&event.data)
                .map_err(|e| crate::error::SourceError::MalformedPayload(e.to_string()))?;
            let (kind, key) = parse_path(&payload.path)?;
            let item = delete_to_item(kind, key, payload.version);
            sink.upsert(kind, key, item)?;
            Ok(())
        }
        other => {
            tracing::debug!(event = %other, "ignoring unrecognized streaming event kind");
            Ok(())
        }
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
