use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ff_eval::{BigSegmentStore, Evaluator, PrerequisiteEvaluation, StoreAdapter};
use ff_events::{
    diagnostic_init_event, start_diagnostics, CustomEvent, DiagnosticCounters, DiagnosticId, EventProcessor,
    EventProcessorHandle, EventSender, FeatureRequestEvent, IdentifyEvent, InputEvent, MigrationOpEvent,
};
use ff_model::{AttributeRef, Context, ErrorKind, EvalDetail, Flag, MultiContext, Reason, Value};
use ff_source::{PollingConfig, PollingSource, StreamingConfig, StreamingSource};
use ff_store::{DataStore, InMemoryDataStore, UpdateSink};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{Config, DataSourceMode};
use crate::hooks::{EvaluationSeriesContext, HookRegistry};
use crate::migration::{run_read, run_write, MigrationOpTracker, MigrationStage, ReadExecutionOrder};
use crate::status::{BigSegmentStoreStatusProvider, DataSourceStatusProvider, DataStoreStatus, FlagChangeNotifier};

const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// `(value, variation-index?, reason)` — the typed-variation counterpart of
/// [`EvalDetail`], returned by the `*VariationDetail` methods.
#[derive(Clone, Debug)]
pub struct VariationDetail<T> {
    pub value: T,
    pub variation_index: Option<usize>,
    pub reason: Reason,
}

enum DataSourceHandle {
    Streaming(StreamingSource),
    Polling(PollingSource),
}

/// Strips attributes the configuration marks private, recording their names
/// on the context's own `private_attributes` list the way the wire format
/// expects, instead of sending their values.
fn redact(context: &Context, all_private: bool, private_names: &[String]) -> Context {
    if !all_private && private_names.is_empty() {
        return context.clone();
    }
    let mut redacted = context.clone();
    let mut removed = Vec::new();
    redacted.attributes.retain(|name, _| {
        let is_private = all_private || private_names.iter().any(|p| p == name);
        if is_private {
            removed.push(AttributeRef::new(name));
        }
        !is_private
    });
    redacted.private_attributes.extend(removed);
    redacted
}

/// The client façade: ties the data store, evaluator, data source, event
/// pipeline, hooks and status providers into the public surface callers use.
pub struct Client<S: DataStore + 'static> {
    config: Config,
    store: Arc<S>,
    sink: Arc<UpdateSink<S>>,
    events: Option<EventProcessorHandle>,
    events_disabled: AtomicBool,
    hooks: HookRegistry,
    initialized: AtomicBool,
    data_source_status: Option<DataSourceStatusProvider>,
    big_segment_status: Option<BigSegmentStoreStatusProvider>,
    data_source_handle: Option<JoinHandle<()>>,
    events_join: Option<JoinHandle<()>>,
    diagnostics_join: Option<JoinHandle<()>>,
}

impl Client<InMemoryDataStore> {
    /// Starts a client backed by the default in-process store. Blocks up to
    /// `config.start_wait_timeout` for the data source's "ready" signal (or
    /// returns immediately, already initialized, in offline/external-updates
    /// modes).
    pub async fn start(config: Config, hooks: HookRegistry) -> Client<InMemoryDataStore> {
        let store = Arc::new(InMemoryDataStore::default());
        Client::start_with_store(config, store, hooks).await
    }
}

impl<S: DataStore + 'static> Client<S> {
    pub async fn start_with_store(config: Config, store: Arc<S>, hooks: HookRegistry) -> Client<S> {
        let sink = Arc::new(UpdateSink::new(store.clone()));

        let events = if config.offline {
            None
        } else {
            let sender = EventSender::new(&config.events.base_url, &config.sdk_key);
            let processor = EventProcessor::start(
                sender,
                config.events.capacity,
                config.events.flush_interval,
                config.events.user_keys_capacity,
                config.events.user_keys_flush_interval,
            );
            Some(processor)
        };
        let (events_handle, events_join) = match events {
            Some(processor) => (Some(processor.handle), Some(processor.join)),
            None => (None, None),
        };

        let diagnostics_join = if !config.offline && !config.events.diagnostic_opt_out {
            let suffix: String = config.sdk_key.chars().rev().take(6).collect::<String>().chars().rev().collect();
            let id = DiagnosticId {
                diagnostic_id: Uuid::new_v4(),
                sdk_key_suffix: suffix,
            };
            let started_at = now_millis();
            let sender = EventSender::new(&config.events.base_url, &config.sdk_key);
            let init_sender = EventSender::new(&config.events.base_url, &config.sdk_key);
            let init_event = diagnostic_init_event(&id, started_at, SDK_VERSION);
            tokio::spawn(async move {
                if let Err(err) = init_sender.send(&[init_event]).await {
                    tracing::debug!(error = %err, "failed to deliver diagnostic-init event");
                }
            });
            Some(start_diagnostics(
                sender,
                id,
                config.events.diagnostic_recording_interval,
                Arc::new(DiagnosticCounters::default()),
                started_at,
            ))
        } else {
            None
        };

        let mut client = Client {
            config: config.clone(),
            store,
            sink,
            events: events_handle,
            events_disabled: AtomicBool::new(false),
            hooks,
            initialized: AtomicBool::new(false),
            data_source_status: None,
            big_segment_status: None,
            data_source_handle: None,
            events_join,
            diagnostics_join,
        };

        if config.offline || config.external_updates_only {
            client.initialized.store(true, Ordering::SeqCst);
            return client;
        }

        let data_source = match config.data_source_mode {
            DataSourceMode::Streaming => {
                let started = StreamingSource::start(
                    StreamingConfig {
                        stream_base_url: config.streaming.base_url.clone(),
                        sdk_key: config.sdk_key.clone(),
                        initial_retry_delay: config.streaming.initial_retry_delay,
                        max_retry_delay: config.streaming.max_retry_delay,
                    },
                    client.sink.clone(),
                );
                DataSourceHandle::Streaming(started)
            }
            DataSourceMode::Polling => {
                let started = PollingSource::start(
                    PollingConfig {
                        polling_base_url: config.polling.base_url.clone(),
                        sdk_key: config.sdk_key.clone(),
                        poll_interval: config.polling.poll_interval,
                    },
                    client.sink.clone(),
                );
                DataSourceHandle::Polling(started)
            }
        };

        let (status_provider, join, ready) = match data_source {
            DataSourceHandle::Streaming(source) => {
                (DataSourceStatusProvider::new(source.status), source.handle, source.ready)
            }
            DataSourceHandle::Polling(source) => {
                (DataSourceStatusProvider::new(source.status), source.handle, source.ready)
            }
        };
        client.data_source_status = Some(status_provider);
        client.data_source_handle = Some(join);

        let initialized = tokio::time::timeout(config.start_wait_timeout, ready)
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or(false);
        client.initialized.store(initialized, Ordering::SeqCst);

        client
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn data_source_status(&self) -> Option<&DataSourceStatusProvider> {
        self.data_source_status.as_ref()
    }

    pub fn big_segment_store_status(&self) -> Option<&BigSegmentStoreStatusProvider> {
        self.big_segment_status.as_ref()
    }

    pub fn flag_changes(&self) -> FlagChangeNotifier {
        FlagChangeNotifier::new(self.sink.subscribe())
    }

    /// Whether the data store itself is reachable. Always `Available` for a
    /// store that doesn't track outages; reflects `CachingStore`'s outage
    /// flag when `S` is one.
    pub fn data_store_status(&self) -> DataStoreStatus {
        if self.store.is_available() {
            DataStoreStatus::Available
        } else {
            DataStoreStatus::Unavailable
        }
    }

    /// Attaches a big-segments store and starts its staleness poller. Takes
    /// `self` by value at construction time since the poller is spawned
    /// once, before any evaluation needs it.
    pub fn with_big_segments<B: BigSegmentStore + 'static>(mut self, store: Arc<B>) -> Client<S> {
        let poller = ff_source::BigSegmentStatusPoller::start(
            store,
            self.config.big_segments.status_poll_interval,
            self.config.big_segments.stale_after,
        );
        self.big_segment_status = Some(BigSegmentStoreStatusProvider::new(poller.subscribe()));
        self
    }

    fn events_active(&self) -> bool {
        self.events.is_some() && !self.events_disabled.load(Ordering::SeqCst)
    }

    fn submit(&self, event: InputEvent) {
        if self.events_active() {
            if let Some(handle) = &self.events {
                handle.submit(event);
            }
        }
    }

    /// Suppresses event emission for the returned handle while still
    /// delegating every other call to this client. `enabled` here means
    /// "events disabled", matching the public `withEventsDisabled(bool)`
    /// call.
    pub fn with_events_disabled(&self, disabled: bool) -> EventsDisabledView<'_, S> {
        EventsDisabledView { client: self, disabled }
    }

    fn variation_internal(&self, flag_key: &str, context: &Context, suppress_events: bool) -> (EvalDetail<Value>, Option<Flag>) {
        if !self.is_initialized() {
            return (EvalDetail::new(Value::Null, None, Reason::error(ErrorKind::ClientNotReady)), None);
        }
        if flag_key.is_empty() {
            return (EvalDetail::new(Value::Null, None, Reason::error(ErrorKind::FlagNotFound)), None);
        }

        let adapter = StoreAdapter::new(self.store.clone());
        let Some(flag) = ff_eval::FlagSource::flag(&adapter, flag_key) else {
            return (EvalDetail::new(Value::Null, None, Reason::error(ErrorKind::FlagNotFound)), None);
        };

        let multi = MultiContext::single(context.clone());
        let series_ctx = EvaluationSeriesContext {
            flag_key: flag_key.to_string(),
            context: context.clone(),
            default_value: Value::Null,
            method: "variation",
        };

        let flag_for_eval = flag.clone();
        let prereq_events: std::cell::RefCell<Vec<PrerequisiteEvaluation>> = std::cell::RefCell::new(Vec::new());
        let detail = self.hooks.run_evaluation(&series_ctx, || {
            let mut evaluator = Evaluator::new(&adapter, &adapter, None);
            let result = evaluator.evaluate(&flag_for_eval, &multi);
            *prereq_events.borrow_mut() = result.prerequisite_evaluations;
            result.detail
        });

        if !suppress_events {
            for prereq in prereq_events.into_inner() {
                self.record_evaluation(&prereq.flag, context, &prereq.detail, Some(flag.key.clone()));
            }
            self.record_evaluation(&flag, context, &detail, None);
        }

        (detail, Some(flag))
    }

    fn record_evaluation(&self, flag: &Flag, context: &Context, detail: &EvalDetail<Value>, prereq_of: Option<String>) {
        if !self.events_active() {
            return;
        }
        let event = self.build_feature_event(flag, context, detail, prereq_of);
        self.submit(InputEvent::Feature(event));
    }

    fn build_feature_event(&self, flag: &Flag, context: &Context, detail: &EvalDetail<Value>, prereq_of: Option<String>) -> FeatureRequestEvent {
        let redacted = redact(context, self.config.events.all_attributes_private, &self.config.events.private_attribute_names);
        let now = now_millis();
        FeatureRequestEvent {
            creation_date: now,
            key: flag.key.clone(),
            context: redacted,
            value: detail.value.clone(),
            variation: detail.variation_index,
            default: Value::Null,
            version: Some(flag.version),
            prereq_of,
            reason: Some(detail.reason.clone()),
            track_events: flag.track_events,
            debug_events_until_date: flag.debug_events_until_date.filter(|&until| now < until),
        }
    }

    fn typed_detail<T>(&self, flag_key: &str, context: &Context, default: T, extract: impl Fn(&Value) -> Option<T>) -> VariationDetail<T>
    where
        T: Clone,
    {
        let (detail, _) = self.variation_internal(flag_key, context, false);
        match extract(&detail.value) {
            Some(value) => VariationDetail {
                value,
                variation_index: detail.variation_index,
                reason: detail.reason,
            },
            None if detail.reason.is_error() => VariationDetail {
                value: default,
                variation_index: None,
                reason: detail.reason,
            },
            None => VariationDetail {
                value: default,
                variation_index: None,
                reason: Reason::error(ErrorKind::WrongType),
            },
        }
    }

    pub fn bool_variation(&self, flag_key: &str, context: &Context, default: bool) -> bool {
        self.bool_variation_detail(flag_key, context, default).value
    }

    pub fn bool_variation_detail(&self, flag_key: &str, context: &Context, default: bool) -> VariationDetail<bool> {
        self.typed_detail(flag_key, context, default, Value::as_bool)
    }

    pub fn int_variation(&self, flag_key: &str, context: &Context, default: i64) -> i64 {
        self.int_variation_detail(flag_key, context, default).value
    }

    pub fn int_variation_detail(&self, flag_key: &str, context: &Context, default: i64) -> VariationDetail<i64> {
        self.typed_detail(flag_key, context, default, Value::as_int)
    }

    pub fn float_variation(&self, flag_key: &str, context: &Context, default: f64) -> f64 {
        self.float_variation_detail(flag_key, context, default).value
    }

    pub fn float_variation_detail(&self, flag_key: &str, context: &Context, default: f64) -> VariationDetail<f64> {
        self.typed_detail(flag_key, context, default, Value::as_f64)
    }

    pub fn string_variation(&self, flag_key: &str, context: &Context, default: &str) -> String {
        self.string_variation_detail(flag_key, context, default).value
    }

    pub fn string_variation_detail(&self, flag_key: &str, context: &Context, default: &str) -> VariationDetail<String> {
        self.typed_detail(flag_key, context, default.to_string(), |v| v.as_str().map(|s| s.to_string()))
    }

    pub fn json_variation(&self, flag_key: &str, context: &Context, default: Value) -> Value {
        self.json_variation_detail(flag_key, context, default).value
    }

    pub fn json_variation_detail(&self, flag_key: &str, context: &Context, default: Value) -> VariationDetail<Value> {
        let (detail, _) = self.variation_internal(flag_key, context, false);
        if detail.reason.is_error() && detail.variation_index.is_none() {
            return VariationDetail {
                value: default,
                variation_index: None,
                reason: detail.reason,
            };
        }
        VariationDetail {
            value: detail.value,
            variation_index: detail.variation_index,
            reason: detail.reason,
        }
    }

    /// Evaluates `flag_key` as a migration-stage flag (falling back to
    /// `default_stage` if the flag is missing or its value isn't a
    /// recognized stage string) and returns the stage plus the data needed
    /// to build the embedded evaluation event for a `MigrationOpEvent`.
    fn resolve_migration_stage(&self, flag_key: &str, context: &Context, default_stage: MigrationStage) -> (MigrationStage, Option<Flag>, EvalDetail<Value>) {
        let (detail, flag) = self.variation_internal(flag_key, context, true);
        let stage = detail.value.as_str().and_then(MigrationStage::parse).unwrap_or(default_stage);
        (stage, flag, detail)
    }

    /// Ratio out of 100_000, the same scale rollout weights use, resolved
    /// from the flag's migration parameters; `1.0` (always) if absent.
    fn migration_check_ratio(flag: &Option<Flag>) -> f64 {
        flag.as_ref()
            .and_then(|f| f.migration.as_ref())
            .and_then(|m| m.check_ratio)
            .map(|ratio| ratio as f64 / 100_000.0)
            .unwrap_or(1.0)
    }

    fn submit_migration_event(&self, flag_key: &str, context: &Context, flag: Option<Flag>, detail: EvalDetail<Value>, tracker: MigrationOpTracker, operation: &str) {
        if !self.events_active() {
            return;
        }
        let evaluation = match &flag {
            Some(flag) => self.build_feature_event(flag, context, &detail, None),
            None => self.build_feature_event(&Flag::tombstone(flag_key, 0), context, &detail, None),
        };
        let redacted = redact(context, self.config.events.all_attributes_private, &self.config.events.private_attribute_names);
        let event: MigrationOpEvent = tracker.into_event(flag_key.to_string(), redacted, evaluation, now_millis());
        debug_assert_eq!(event.operation, operation);
        self.submit(InputEvent::MigrationOp(event));
    }

    /// Evaluates a migration-stage flag and orchestrates `old`/`new` reads
    /// per the stage's authoritative/non-authoritative table, recording
    /// latency, errors, and (when `compare` is given) consistency, then
    /// submits a single `MigrationOpEvent`.
    pub async fn migration_read<T, OldFut, NewFut, Cmp>(
        &self,
        flag_key: &str,
        context: &Context,
        default_stage: MigrationStage,
        order: ReadExecutionOrder,
        old: impl FnOnce() -> OldFut,
        new: impl FnOnce() -> NewFut,
        compare: Cmp,
    ) -> Result<T, String>
    where
        OldFut: Future<Output = Result<T, String>>,
        NewFut: Future<Output = Result<T, String>>,
        Cmp: FnOnce(&T, &T) -> bool,
    {
        let (stage, flag, detail) = self.resolve_migration_stage(flag_key, context, default_stage);
        let check_ratio = Self::migration_check_ratio(&flag);
        let mut tracker = MigrationOpTracker::new("read");
        let result = run_read(stage, order, &mut tracker, check_ratio, old, new, compare).await;
        self.submit_migration_event(flag_key, context, flag, detail, tracker, "read");
        result
    }

    /// Evaluates a migration-stage flag and orchestrates `old`/`new` writes
    /// per the stage's authoritative/secondary table: the authoritative
    /// write runs first and short-circuits the secondary on failure.
    pub async fn migration_write<T, OldFut, NewFut>(
        &self,
        flag_key: &str,
        context: &Context,
        default_stage: MigrationStage,
        old: impl FnOnce() -> OldFut,
        new: impl FnOnce() -> NewFut,
    ) -> Result<T, String>
    where
        OldFut: Future<Output = Result<T, String>>,
        NewFut: Future<Output = Result<T, String>>,
    {
        let (stage, flag, detail) = self.resolve_migration_stage(flag_key, context, default_stage);
        let mut tracker = MigrationOpTracker::new("write");
        let result = run_write(stage, &mut tracker, old, new).await;
        self.submit_migration_event(flag_key, context, flag, detail, tracker, "write");
        result
    }

    /// A serializable snapshot of every non-deleted flag's value for
    /// `context`, suitable for bootstrapping a client-side SDK. Never
    /// produces evaluation events.
    pub fn all_flags_state(&self, context: &Context, options: AllFlagsStateOptions) -> AllFlagsState {
        let mut flags = HashMap::new();
        if !self.is_initialized() {
            return AllFlagsState { flags };
        }
        let adapter = StoreAdapter::new(self.store.clone());
        let Ok(all) = self.store.all(ff_model::DataKind::Flag) else {
            return AllFlagsState { flags };
        };
        let multi = MultiContext::single(context.clone());
        let now = now_millis();
        for (key, item) in all {
            let Some(flag) = item.as_flag() else { continue };
            if flag.deleted {
                continue;
            }
            if options.client_side_only && !flag.client_side_available {
                continue;
            }
            let mut evaluator = Evaluator::new(&adapter, &adapter, None);
            let detail = evaluator.evaluate(flag, &multi).detail;
            let tracked = flag.track_events || flag.is_debugging_enabled(now);
            let reason = if options.details_only_for_tracked_flags && !tracked {
                None
            } else {
                Some(detail.reason)
            };
            flags.insert(
                key,
                FlagState {
                    value: detail.value,
                    variation: detail.variation_index,
                    version: flag.version,
                    reason,
                },
            );
        }
        AllFlagsState { flags }
    }

    pub fn identify(&self, context: &Context) {
        if !self.events_active() {
            return;
        }
        let redacted = redact(context, self.config.events.all_attributes_private, &self.config.events.private_attribute_names);
        self.submit(InputEvent::Identify(IdentifyEvent {
            creation_date: now_millis(),
            context: redacted,
        }));
    }

    pub fn track_event(&self, name: &str, context: &Context, data: Option<Value>) {
        self.track(name, context, data, None);
    }

    pub fn track_metric(&self, name: &str, context: &Context, metric_value: f64, data: Option<Value>) {
        self.track(name, context, data, Some(metric_value));
    }

    fn track(&self, name: &str, context: &Context, data: Option<Value>, metric_value: Option<f64>) {
        if !self.events_active() {
            return;
        }
        let redacted = redact(context, self.config.events.all_attributes_private, &self.config.events.private_attribute_names);
        self.submit(InputEvent::Custom(CustomEvent {
            creation_date: now_millis(),
            key: name.to_string(),
            context: redacted,
            data,
            metric_value,
        }));
    }

    pub fn flush(&self) {
        if let Some(handle) = &self.events {
            handle.flush();
        }
    }

    /// Returns `true` iff the current buffer was accepted by the sender
    /// before `timeout` elapsed. With events disabled or no pending events
    /// there is nothing to wait for, so this returns `true` immediately.
    pub async fn flush_and_wait(&self, timeout: Duration) -> bool {
        let Some(handle) = &self.events else {
            return true;
        };
        tokio::time::timeout(timeout, handle.flush_and_wait()).await.is_ok()
    }

    /// Idempotent shutdown, in order: stop the data source, flush and close
    /// the event processor, then drop the store. Safe to call more than
    /// once; the second call is a no-op because the handles are already
    /// gone.
    pub async fn close(&mut self) {
        if let Some(join) = self.data_source_handle.take() {
            join.abort();
        }
        if let Some(join) = self.diagnostics_join.take() {
            join.abort();
        }
        if let Some(handle) = self.events.take() {
            handle.close().await;
        }
        if let Some(join) = self.events_join.take() {
            let _ = join.await;
        }
    }
}

pub struct EventsDisabledView<'a, S: DataStore + 'static> {
    client: &'a Client<S>,
    disabled: bool,
}

impl<'a, S: DataStore + 'static> EventsDisabledView<'a, S> {
    pub fn bool_variation(&self, flag_key: &str, context: &Context, default: bool) -> bool {
        self.with_suppression(|| self.client.bool_variation(flag_key, context, default))
    }

    pub fn bool_variation_detail(&self, flag_key: &str, context: &Context, default: bool) -> VariationDetail<bool> {
        self.with_suppression(|| self.client.bool_variation_detail(flag_key, context, default))
    }

    pub fn int_variation(&self, flag_key: &str, context: &Context, default: i64) -> i64 {
        self.with_suppression(|| self.client.int_variation(flag_key, context, default))
    }

    pub fn int_variation_detail(&self, flag_key: &str, context: &Context, default: i64) -> VariationDetail<i64> {
        self.with_suppression(|| self.client.int_variation_detail(flag_key, context, default))
    }

    pub fn float_variation(&self, flag_key: &str, context: &Context, default: f64) -> f64 {
        self.with_suppression(|| self.client.float_variation(flag_key, context, default))
    }

    pub fn float_variation_detail(&self, flag_key: &str, context: &Context, default: f64) -> VariationDetail<f64> {
        self.with_suppression(|| self.client.float_variation_detail(flag_key, context, default))
    }

    pub fn string_variation(&self, flag_key: &str, context: &Context, default: &str) -> String {
        self.with_suppression(|| self.client.string_variation(flag_key, context, default))
    }

    pub fn string_variation_detail(&self, flag_key: &str, context: &Context, default: &str) -> VariationDetail<String> {
        self.with_suppression(|| self.client.string_variation_detail(flag_key, context, default))
    }

    pub fn json_variation(&self, flag_key: &str, context: &Context, default: Value) -> Value {
        self.with_suppression(|| self.client.json_variation(flag_key, context, default))
    }

    pub fn json_variation_detail(&self, flag_key: &str, context: &Context, default: Value) -> VariationDetail<Value> {
        self.with_suppression(|| self.client.json_variation_detail(flag_key, context, default))
    }

    fn with_suppression<T>(&self, f: impl FnOnce() -> T) -> T {
        let was_disabled = self.client.events_disabled.swap(self.disabled, Ordering::SeqCst);
        let result = f();
        self.client.events_disabled.store(was_disabled, Ordering::SeqCst);
        result
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FlagState {
    pub value: Value,
    pub variation: Option<usize>,
    pub version: u64,
    #[serde(skip)]
    pub reason: Option<Reason>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AllFlagsState {
    #[serde(flatten)]
    pub flags: HashMap<String, FlagState>,
}

/// Filters applied by [`Client::all_flags_state`]. Both default to `false`,
/// matching the server-wide bootstrap use case (every flag, every reason).
#[derive(Clone, Copy, Debug, Default)]
pub struct AllFlagsStateOptions {
    /// Only include flags marked available to client-side SDKs.
    pub client_side_only: bool,
    /// Omit the evaluation reason for flags that don't have event tracking
    /// or a live debug window, to keep bootstrap payloads small.
    pub details_only_for_tracked_flags: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn redact_leaves_context_untouched_when_nothing_is_private() {
        let ctx = Context::new("u1").with_attribute("email", Value::from_str("a@example.com"));
        let redacted = redact(&ctx, false, &[]);
        assert_eq!(redacted.attributes.get("email"), Some(&Value::from_str("a@example.com")));
        assert!(redacted.private_attributes.is_empty());
    }

    #[test]
    fn redact_strips_named_private_attributes() {
        let ctx = Context::new("u1")
            .with_attribute("email", Value::from_str("a@example.com"))
            .with_attribute("plan", Value::from_str("gold"));
        let redacted = redact(&ctx, false, &["email".to_string()]);
        assert!(redacted.attributes.get("email").is_none());
        assert_eq!(redacted.attributes.get("plan"), Some(&Value::from_str("gold")));
        assert_eq!(redacted.private_attributes, vec![AttributeRef::new("email")]);
    }

    #[test]
    fn redact_strips_everything_when_all_attributes_private() {
        let ctx = Context::new("u1")
            .with_attribute("email", Value::from_str("a@example.com"))
            .with_attribute("plan", Value::from_str("gold"));
        let redacted = redact(&ctx, true, &[]);
        assert!(redacted.attributes.is_empty());
        assert_eq!(redacted.private_attributes.len(), 2);
    }

    async fn offline_client() -> Client<InMemoryDataStore> {
        let config = ConfigBuilder::new("test-sdk-key").offline(true).build();
        Client::start(config, HookRegistry::default()).await
    }

    /// Builds a client that has never completed `start_with_store`'s
    /// initialization handshake, to exercise the not-ready path without
    /// spinning up a real data source.
    fn uninitialized_client() -> Client<InMemoryDataStore> {
        let config = ConfigBuilder::new("test-sdk-key").offline(true).build();
        let store = Arc::new(InMemoryDataStore::default());
        let sink = Arc::new(UpdateSink::new(store.clone()));
        Client {
            config,
            store,
            sink,
            events: None,
            events_disabled: AtomicBool::new(false),
            hooks: HookRegistry::default(),
            initialized: AtomicBool::new(false),
            data_source_status: None,
            big_segment_status: None,
            data_source_handle: None,
            events_join: None,
            diagnostics_join: None,
        }
    }

    #[test]
    fn variation_before_initialization_reports_client_not_ready() {
        let client = uninitialized_client();
        let (detail, flag) = client.variation_internal("flag", &Context::new("u1"), true);
        assert!(flag.is_none());
        assert_eq!(detail.reason, Reason::error(ErrorKind::ClientNotReady));
    }

    #[tokio::test]
    async fn empty_flag_key_reports_flag_not_found() {
        let client = offline_client().await;
        let (detail, flag) = client.variation_internal("", &Context::new("u1"), true);
        assert!(flag.is_none());
        assert_eq!(detail.reason, Reason::error(ErrorKind::FlagNotFound));
    }

    #[tokio::test]
    async fn bool_variation_falls_back_to_default_for_unknown_flag() {
        let client = offline_client().await;
        assert!(client.bool_variation("missing", &Context::new("u1"), true));
        assert!(!client.bool_variation("missing", &Context::new("u1"), false));
    }
}
