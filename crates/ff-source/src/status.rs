use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{DataSourceErrorInfo, Recoverability};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSourceState {
    Initializing,
    Valid,
    Interrupted,
    Off,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataSourceStatus {
    pub state: DataSourceState,
    pub state_since_millis: i64,
    pub last_error: Option<DataSourceErrorInfo>,
}

impl DataSourceStatus {
    fn initial(now_millis: i64) -> DataSourceStatus {
        DataSourceStatus {
            state: DataSourceState::Initializing,
            state_since_millis: now_millis,
            last_error: None,
        }
    }
}

/// How long a recoverable failure can stay unresolved before it gets
/// re-logged at ERROR instead of WARN. Transient retries within the window
/// stay at WARN so a single flaky request doesn't page anyone.
pub const DEFAULT_ERROR_ESCALATION_WINDOW: Duration = Duration::from_secs(60);

/// Tracks the data source state machine described by the four states
/// `initializing`/`valid`/`interrupted`/`off`, and signals readiness (with
/// `initialized`) exactly once: on the first successful payload, or on the
/// first unrecoverable error, whichever comes first.
pub struct StatusTracker {
    tx: watch::Sender<DataSourceStatus>,
    ready_tx: Option<tokio::sync::oneshot::Sender<bool>>,
    escalation_window: Duration,
    unresolved_since_millis: Option<i64>,
    escalated: bool,
}

pub struct StatusTrackerHandle {
    rx: watch::Receiver<DataSourceStatus>,
}

impl StatusTrackerHandle {
    pub fn current(&self) -> DataSourceStatus {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DataSourceStatus> {
        self.rx.clone()
    }
}

impl StatusTracker {
    pub fn new(now_millis: i64) -> (StatusTracker, StatusTrackerHandle, tokio::sync::oneshot::Receiver<bool>) {
        StatusTracker::with_escalation_window(now_millis, DEFAULT_ERROR_ESCALATION_WINDOW)
    }

    pub fn with_escalation_window(
        now_millis: i64,
        escalation_window: Duration,
    ) -> (StatusTracker, StatusTrackerHandle, tokio::sync::oneshot::Receiver<bool>) {
        let (tx, rx) = watch::channel(DataSourceStatus::initial(now_millis));
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        (
            StatusTracker {
                tx,
                ready_tx: Some(ready_tx),
                escalation_window,
                unresolved_since_millis: None,
                escalated: false,
            },
            StatusTrackerHandle { rx },
            ready_rx,
        )
    }

    pub fn on_success(&mut self, now_millis: i64) {
        self.unresolved_since_millis = None;
        self.escalated = false;
        self.transition(DataSourceState::Valid, now_millis, None);
        self.signal_ready(true);
    }

    pub fn on_error(&mut self, error: DataSourceErrorInfo, now_millis: i64) {
        let current = self.tx.borrow().state;
        if current == DataSourceState::Off {
            return;
        }
        match error.recoverability() {
            Recoverability::Recoverable => {
                let since = *self.unresolved_since_millis.get_or_insert(now_millis);
                let unresolved_for = Duration::from_millis(now_millis.saturating_sub(since).max(0) as u64);
                if unresolved_for >= self.escalation_window {
                    if !self.escalated {
                        self.escalated = true;
                        tracing::error!(message = %error.message, status_code = ?error.status_code, "data source connection failure unresolved beyond escalation window");
                    }
                } else {
                    tracing::warn!(message = %error.message, status_code = ?error.status_code, "data source connection failure");
                }
                self.transition(DataSourceState::Interrupted, now_millis, Some(error));
            }
            Recoverability::Unrecoverable => {
                self.transition(DataSourceState::Off, now_millis, Some(error));
                self.signal_ready(false);
            }
        }
    }

    fn signal_ready(&mut self, initialized: bool) {
        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(initialized);
        }
    }

    fn transition(&mut self, state: DataSourceState, now_millis: i64, error: Option<DataSourceErrorInfo>) {
        self.tx.send_modify(|status| {
            if status.state != state {
                status.state = state;
                status.state_since_millis = now_millis;
            }
            if error.is_some() {
                status.last_error = error;
            }
        });
    }
}

/// How long the stream must be continuously healthy before the next failure
/// is treated as a fresh backoff sequence rather than a continuation.
pub const HEALTHY_RESET_THRESHOLD: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct HealthTracker {
    healthy_since: Option<Instant>,
}

impl HealthTracker {
    pub fn new() -> HealthTracker {
        HealthTracker { healthy_since: None }
    }

    pub fn note_success(&mut self, now: Instant) {
        if self.healthy_since.is_none() {
            self.healthy_since = Some(now);
        }
    }

    pub fn note_failure(&mut self) {
        self.healthy_since = None;
    }

    pub fn has_been_healthy_for(&self, now: Instant, threshold: Duration) -> bool {
        self.healthy_since.map(|since| now.duration_since(since) >= threshold).unwrap_or(false)
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        HealthTracker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_error_interrupts_from_valid() {
        let (mut tracker, handle, _ready) = StatusTracker::new(0);
        tracker.on_success(1);
        tracker.on_error(DataSourceErrorInfo::http(500, "server error", 2), 2);
        assert_eq!(handle.current().state, DataSourceState::Interrupted);
    }

    #[test]
    fn escalation_flag_only_trips_after_the_window() {
        let (mut tracker, _handle, _ready) = StatusTracker::with_escalation_window(0, Duration::from_millis(100));
        tracker.on_error(DataSourceErrorInfo::http(500, "first failure", 0), 0);
        assert!(!tracker.escalated);
        tracker.on_error(DataSourceErrorInfo::http(500, "still failing", 50), 50);
        assert!(!tracker.escalated);
        tracker.on_error(DataSourceErrorInfo::http(500, "still failing", 150), 150);
        assert!(tracker.escalated);
    }

    #[test]
    fn success_resets_escalation_state() {
        let (mut tracker, _handle, _ready) = StatusTracker::with_escalation_window(0, Duration::from_millis(100));
        tracker.on_error(DataSourceErrorInfo::http(500, "failure", 0), 0);
        tracker.on_error(DataSourceErrorInfo::http(500, "failure", 150), 150);
        assert!(tracker.escalated);
        tracker.on_success(200);
        tracker.on_error(DataSourceErrorInfo::http(500, "new failure", 210), 210);
        assert!(!tracker.escalated);
    }

    #[test]
    fn unrecoverable_error_goes_off_and_stays_off() {
        let (mut tracker, handle, _ready) = StatusTracker::new(0);
        tracker.on_error(DataSourceErrorInfo::http(401, "unauthorized", 1), 1);
        assert_eq!(handle.current().state, DataSourceState::Off);
        tracker.on_error(DataSourceErrorInfo::http(500, "server error", 2), 2);
        assert_eq!(handle.current().state, DataSourceState::Off);
    }

    #[tokio::test]
    async fn ready_signal_fires_once_on_first_success() {
        let (mut tracker, _handle, ready) = StatusTracker::new(0);
        tracker.on_success(1);
        assert_eq!(ready.await, Ok(true));
    }

    #[tokio::test]
    async fn ready_signal_fires_on_first_unrecoverable_error() {
        let (mut tracker, _handle, ready) = StatusTracker::new(0);
        tracker.on_error(DataSourceErrorInfo::http(404, "not found", 1), 1);
        assert_eq!(ready.await, Ok(false));
    }

    #[test]
    fn health_tracker_requires_continuous_uptime() {
        let mut health = HealthTracker::new();
        let t0 = Instant::now();
        health.note_success(t0);
        assert!(!health.has_been_healthy_for(t0, HEALTHY_RESET_THRESHOLD));
        assert!(health.has_been_healthy_for(t0 + Duration::from_secs(61), HEALTHY_RESET_THRESHOLD));
        health.note_failure();
        assert!(!health.has_been_healthy_for(t0 + Duration::from_secs(61), HEALTHY_RESET_THRESHOLD));
    }
}
