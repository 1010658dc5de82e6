use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde_json::Value as JsonValue;

/// Posts a batch of wire events to the analytics endpoint, splitting once on
/// HTTP 413 (payload too large) and tracking the clock skew against the
/// server's `Date` header so debug-event expiry can be judged against
/// server time rather than a possibly-wrong local clock.
pub struct EventSender {
    http: reqwest::Client,
    url: String,
    sdk_key: String,
    server_time_offset_millis: Arc<AtomicI64>,
}

impl EventSender {
    pub fn new(events_base_url: &str, sdk_key: &str) -> EventSender {
        EventSender {
            http: reqwest::Client::new(),
            url: format!("{}/bulk", events_base_url.trim_end_matches('/')),
            sdk_key: sdk_key.to_string(),
            server_time_offset_millis: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn server_time_offset_millis(&self) -> i64 {
        self.server_time_offset_millis.load(Ordering::Relaxed)
    }

    pub async fn send(&self, payload: &[JsonValue]) -> Result<(), SendError> {
        if payload.is_empty() {
            return Ok(());
        }
        match self.post(payload).await {
            Ok(()) => Ok(()),
            Err(SendError::TooLarge) if payload.len() > 1 => {
                let mid = payload.len() / 2;
                tracing::warn!(size = payload.len(), "event batch too large, splitting and retrying once");
                self.post(&payload[..mid]).await?;
                self.post(&payload[mid..]).await
            }
            Err(err) => Err(err),
        }
    }

    async fn post(&self, payload: &[JsonValue]) -> Result<(), SendError> {
        let response = self
            .http
            .post(&self.url)
            .header("Authorization", &self.sdk_key)
            .header("X-LaunchDarkly-Event-Schema", "4")
            .json(payload)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        if let Some(date) = response.headers().get(reqwest::header::DATE) {
            if let Ok(text) = date.to_str() {
                if let Ok(server_time) = chrono::DateTime::parse_from_rfc2822(text) {
                    let server_millis = server_time.timestamp_millis();
                    let local_millis = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0);
                    self.server_time_offset_millis
                        .store(server_millis - local_millis, Ordering::Relaxed);
                }
            }
        }

        if response.status().as_u16() == 413 {
            return Err(SendError::TooLarge);
        }
        if !response.status().is_success() {
            return Err(SendError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("transport error sending events: {0}")]
    Transport(String),
    #[error("event payload rejected with status {0}")]
    Rejected(u16),
    #[error("event payload too large")]
    TooLarge,
}
