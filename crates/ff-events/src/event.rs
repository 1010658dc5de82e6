use ff_model::{Context, Reason, Value};

#[derive(Clone, Debug)]
pub struct FeatureRequestEvent {
    pub creation_date: i64,
    pub key: String,
    pub context: Context,
    pub value: Value,
    pub variation: Option<usize>,
    pub default: Value,
    pub version: Option<u64>,
    pub prereq_of: Option<String>,
    pub reason: Option<Reason>,
    pub track_events: bool,
    pub debug_events_until_date: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct IdentifyEvent {
    pub creation_date: i64,
    pub context: Context,
}

#[derive(Clone, Debug)]
pub struct CustomEvent {
    pub creation_date: i64,
    pub key: String,
    pub context: Context,
    pub data: Option<Value>,
    pub metric_value: Option<f64>,
}

/// Registers a context with the backend on its own, without being attached
/// to any other event. Emitted when a context is newly seen during a flush
/// and no other event in that flush already carries it in full.
#[derive(Clone, Debug)]
pub struct IndexEvent {
    pub creation_date: i64,
    pub context: Context,
}

#[derive(Clone, Debug)]
pub struct MigrationOpEvent {
    pub creation_date: i64,
    pub operation: String,
    pub flag_key: String,
    pub context: Context,
    pub evaluation: FeatureRequestEvent,
    pub consistency_check: Option<bool>,
    pub invoked: Vec<String>,
    pub latencies_millis: Vec<(String, f64)>,
    pub errors: Vec<String>,
}

/// One item submitted to the event pipeline. The worker turns these into
/// individual wire events and/or summary counters depending on
/// `track_events`/debug state.
#[derive(Clone, Debug)]
pub enum InputEvent {
    Feature(FeatureRequestEvent),
    Identify(IdentifyEvent),
    Custom(CustomEvent),
    MigrationOp(MigrationOpEvent),
    Index(IndexEvent),
}
