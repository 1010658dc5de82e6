use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::dedup::ContextKeyCache;
use crate::event::{IndexEvent, InputEvent};
use crate::sender::EventSender;
use crate::summarizer::Summarizer;
use crate::wire::{self, ContextPayload};

enum Command {
    Event(InputEvent),
    Flush,
    FlushAndWait(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct EventProcessorHandle {
    tx: mpsc::Sender<Command>,
}

impl EventProcessorHandle {
    /// Enqueues an event, dropping it (and logging) if the queue is full
    /// rather than applying backpressure to the caller's evaluation path.
    pub fn submit(&self, event: InputEvent) {
        match self.tx.try_send(Command::Event(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("event queue is full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub fn flush(&self) {
        let _ = self.tx.try_send(Command::Flush);
    }

    pub async fn flush_and_wait(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::FlushAndWait(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub async fn close(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

pub struct EventProcessor {
    pub handle: EventProcessorHandle,
    pub join: JoinHandle<()>,
}

impl EventProcessor {
    pub fn start(
        sender: EventSender,
        capacity: usize,
        flush_interval: Duration,
        user_keys_capacity: usize,
        user_keys_flush_interval: Duration,
    ) -> EventProcessor {
        let (tx, rx) = mpsc::channel(capacity);
        let join = tokio::spawn(run(rx, sender, flush_interval, user_keys_capacity, user_keys_flush_interval));
        EventProcessor {
            handle: EventProcessorHandle { tx },
            join,
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<Command>,
    sender: EventSender,
    flush_interval: Duration,
    user_keys_capacity: usize,
    user_keys_flush_interval: Duration,
) {
    let mut individual_events: Vec<serde_json::Value> = Vec::new();
    let mut summarizer = Summarizer::new();
    let mut seen_contexts = ContextKeyCache::new(user_keys_capacity, user_keys_flush_interval);
    let mut interval = tokio::time::interval(flush_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            maybe_cmd = rx.recv() => {
                match maybe_cmd {
                    Some(Command::Event(event)) => {
                        record(&mut individual_events, &mut summarizer, &mut seen_contexts, event);
                    }
                    Some(Command::Flush) => {
                        do_flush(&sender, &mut individual_events, &mut summarizer).await;
                    }
                    Some(Command::FlushAndWait(done)) => {
                        do_flush(&sender, &mut individual_events, &mut summarizer).await;
                        let _ = done.send(());
                    }
                    Some(Command::Shutdown(done)) => {
                        do_flush(&sender, &mut individual_events, &mut summarizer).await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        do_flush(&sender, &mut individual_events, &mut summarizer).await;
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                do_flush(&sender, &mut individual_events, &mut summarizer).await;
            }
        }
    }
}

fn record(
    individual_events: &mut Vec<serde_json::Value>,
    summarizer: &mut Summarizer,
    seen_contexts: &mut ContextKeyCache,
    event: InputEvent,
) {
    let now = Instant::now();
    match event {
        InputEvent::Feature(feature) => {
            summarizer.note(&feature);
            let full = seen_contexts.note(&feature.context.key, now);
            let carries_context = feature.track_events || feature.debug_events_until_date.is_some();
            if carries_context {
                let payload = if full {
                    ContextPayload::Full(&feature.context)
                } else {
                    ContextPayload::KeysOnly(&feature.context)
                };
                individual_events.push(wire::feature_event_json(&feature, payload));
            } else if full {
                individual_events.push(wire::index_event_json(&IndexEvent {
                    creation_date: feature.creation_date,
                    context: feature.context.clone(),
                }));
            }
        }
        InputEvent::Identify(identify) => {
            seen_contexts.note(&identify.context.key, now);
            individual_events.push(wire::identify_event_json(&identify));
        }
        InputEvent::Custom(custom) => {
            let full = seen_contexts.note(&custom.context.key, now);
            let payload = if full {
                ContextPayload::Full(&custom.context)
            } else {
                ContextPayload::KeysOnly(&custom.context)
            };
            individual_events.push(wire::custom_event_json(&custom, payload));
        }
        InputEvent::MigrationOp(migration) => {
            let full = seen_contexts.note(&migration.context.key, now);
            let payload = if full {
                ContextPayload::Full(&migration.context)
            } else {
                ContextPayload::KeysOnly(&migration.context)
            };
            individual_events.push(wire::migration_op_event_json(&migration, payload));
        }
        InputEvent::Index(index) => {
            seen_contexts.note(&index.context.key, now);
            individual_events.push(wire::index_event_json(&index));
        }
    }
}

async fn do_flush(sender: &EventSender, individual_events: &mut Vec<serde_json::Value>, summarizer: &mut Summarizer) {
    if let Some(summary) = summarizer.flush() {
        if let Ok(value) = serde_json::to_value(&summary) {
            individual_events.push(value);
        }
    }
    if individual_events.is_empty() {
        return;
    }
    let batch = std::mem::take(individual_events);
    if let Err(err) = sender.send(&batch).await {
        tracing::warn!(error = %err, "failed to deliver event batch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_model::{Context, Reason, Value};

    use crate::event::FeatureRequestEvent;

    fn feature(context: Context, track_events: bool) -> FeatureRequestEvent {
        FeatureRequestEvent {
            creation_date: 1,
            key: "flag".to_string(),
            context,
            value: Value::from_bool(true),
            variation: Some(0),
            default: Value::Null,
            version: Some(1),
            prereq_of: None,
            reason: Some(Reason::Off),
            track_events,
            debug_events_until_date: None,
        }
    }

    #[test]
    fn untracked_evaluation_on_new_context_emits_a_standalone_index_event() {
        let mut individual_events = Vec::new();
        let mut summarizer = Summarizer::new();
        let mut seen_contexts = ContextKeyCache::new(100, Duration::from_secs(300));

        record(
            &mut individual_events,
            &mut summarizer,
            &mut seen_contexts,
            InputEvent::Feature(feature(Context::new("u1"), false)),
        );

        assert_eq!(individual_events.len(), 1);
        assert_eq!(individual_events[0]["kind"], "index");
        assert_eq!(individual_events[0]["context"]["key"], "u1");
    }

    #[test]
    fn repeated_untracked_evaluation_on_same_context_emits_nothing_further() {
        let mut individual_events = Vec::new();
        let mut summarizer = Summarizer::new();
        let mut seen_contexts = ContextKeyCache::new(100, Duration::from_secs(300));

        record(
            &mut individual_events,
            &mut summarizer,
            &mut seen_contexts,
            InputEvent::Feature(feature(Context::new("u1"), false)),
        );
        record(
            &mut individual_events,
            &mut summarizer,
            &mut seen_contexts,
            InputEvent::Feature(feature(Context::new("u1"), false)),
        );

        assert_eq!(individual_events.len(), 1);
    }

    #[test]
    fn tracked_evaluation_carries_its_own_context_with_no_separate_index_event() {
        let mut individual_events = Vec::new();
        let mut summarizer = Summarizer::new();
        let mut seen_contexts = ContextKeyCache::new(100, Duration::from_secs(300));

        record(
            &mut individual_events,
            &mut summarizer,
            &mut seen_contexts,
            InputEvent::Feature(feature(Context::new("u1"), true)),
        );

        assert_eq!(individual_events.len(), 1);
        assert_eq!(individual_events[0]["kind"], "feature");
    }
}
