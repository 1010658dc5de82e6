use ff_model::{Context, Value};
use serde_json::{json, Value as JsonValue};

use crate::event::{CustomEvent, FeatureRequestEvent, IdentifyEvent, IndexEvent, MigrationOpEvent};

/// Whether to inline the full context on an event, or just its kind/key
/// pairs (because an `identify`-equivalent for this context was already
/// sent recently by [`crate::dedup::ContextKeyCache`]).
pub enum ContextPayload<'a> {
    Full(&'a Context),
    KeysOnly(&'a Context),
}

fn context_json(payload: ContextPayload) -> JsonValue {
    match payload {
        ContextPayload::Full(context) => serde_json::to_value(context).unwrap_or(JsonValue::Null),
        ContextPayload::KeysOnly(context) => json!({ "kind": context.kind, "key": context.key }),
    }
}

pub fn feature_event_json(event: &FeatureRequestEvent, context: ContextPayload) -> JsonValue {
    let mut out = json!({
        "kind": if event.debug_events_until_date.is_some() { "debug" } else { "feature" },
        "creationDate": event.creation_date,
        "key": event.key,
        "value": value_json(&event.value),
        "default": value_json(&event.default),
        "context": context_json(context),
    });
    let obj = out.as_object_mut().unwrap();
    if let Some(variation) = event.variation {
        obj.insert("variation".into(), json!(variation));
    }
    if let Some(version) = event.version {
        obj.insert("version".into(), json!(version));
    }
    if let Some(prereq_of) = &event.prereq_of {
        obj.insert("prereqOf".into(), json!(prereq_of));
    }
    if let Some(reason) = &event.reason {
        obj.insert("reason".into(), serde_json::to_value(reason).unwrap_or(JsonValue::Null));
    }
    out
}

pub fn identify_event_json(event: &IdentifyEvent) -> JsonValue {
    json!({
        "kind": "identify",
        "creationDate": event.creation_date,
        "context": context_json(ContextPayload::Full(&event.context)),
    })
}

pub fn index_event_json(event: &IndexEvent) -> JsonValue {
    json!({
        "kind": "index",
        "creationDate": event.creation_date,
        "context": context_json(ContextPayload::Full(&event.context)),
    })
}

pub fn custom_event_json(event: &CustomEvent, context: ContextPayload) -> JsonValue {
    let mut out = json!({
        "kind": "custom",
        "creationDate": event.creation_date,
        "key": event.key,
        "context": context_json(context),
    });
    let obj = out.as_object_mut().unwrap();
    if let Some(data) = &event.data {
        obj.insert("data".into(), value_json(data));
    }
    if let Some(metric_value) = event.metric_value {
        obj.insert("metricValue".into(), json!(metric_value));
    }
    out
}

pub fn migration_op_event_json(event: &MigrationOpEvent, context: ContextPayload) -> JsonValue {
    let mut context_keys = serde_json::Map::new();
    context_keys.insert(event.context.kind.clone(), json!(event.context.key));
    let latencies: std::collections::HashMap<&str, f64> =
        event.latencies_millis.iter().map(|(k, v)| (k.as_str(), *v)).collect();

    json!({
        "kind": "migration_op",
        "creationDate": event.creation_date,
        "operation": event.operation,
        "contextKeys": JsonValue::Object(context_keys),
        "evaluation": feature_event_json(&event.evaluation, context),
        "consistent": event.consistency_check,
        "invoked": event.invoked,
        "latencies": latencies,
        "errors": event.errors,
    })
}

fn value_json(value: &Value) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}
