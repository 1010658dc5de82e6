use std::collections::HashMap;

use ff_model::Value;
use serde::Serialize;

use crate::event::FeatureRequestEvent;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CounterKey {
    flag_key: String,
    variation: Option<usize>,
    version: Option<u64>,
    // `Value` holds an f64 and isn't `Hash`/`Eq`, so the value and the
    // caller-supplied default are fingerprinted through their JSON form to
    // keep two distinct defaults for the same flag/variation from
    // collapsing into a single counter.
    value_fingerprint: String,
    default_fingerprint: String,
}

fn fingerprint(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[derive(Clone, Debug)]
struct Counter {
    value: Value,
    count: u64,
}

/// Accumulates per-flag-per-variation counts between flushes, the way the
/// wire protocol's `summary` event reports evaluation volume without one
/// event per call.
pub struct Summarizer {
    start_date: Option<i64>,
    end_date: i64,
    counters: HashMap<CounterKey, Counter>,
    defaults: HashMap<String, Value>,
}

impl Summarizer {
    pub fn new() -> Summarizer {
        Summarizer {
            start_date: None,
            end_date: 0,
            counters: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn note(&mut self, event: &FeatureRequestEvent) {
        if self.start_date.is_none() {
            self.start_date = Some(event.creation_date);
        }
        self.end_date = self.end_date.max(event.creation_date);
        self.defaults.entry(event.key.clone()).or_insert_with(|| event.default.clone());

        let key = CounterKey {
            flag_key: event.key.clone(),
            variation: event.variation,
            version: event.version,
            value_fingerprint: fingerprint(&event.value),
            default_fingerprint: fingerprint(&event.default),
        };
        self.counters
            .entry(key)
            .and_modify(|c| c.count += 1)
            .or_insert(Counter {
                value: event.value.clone(),
                count: 1,
            });
    }

    /// Drains accumulated counts into a wire-shaped summary payload, and
    /// resets internal state for the next window.
    pub fn flush(&mut self) -> Option<SummaryOutput> {
        if self.counters.is_empty() {
            return None;
        }
        let start_date = self.start_date.unwrap_or(self.end_date);
        let mut features: HashMap<String, FeatureSummary> = HashMap::new();

        for (key, counter) in self.counters.drain() {
            let entry = features.entry(key.flag_key.clone()).or_insert_with(|| FeatureSummary {
                default: self.defaults.get(&key.flag_key).cloned().unwrap_or(Value::Null),
                counters: Vec::new(),
            });
            entry.counters.push(VariationCounter {
                variation: key.variation,
                version: key.version,
                value: counter.value,
                count: counter.count,
                unknown: key.version.is_none(),
            });
        }

        self.start_date = None;
        self.defaults.clear();
        Some(SummaryOutput {
            kind: "summary",
            start_date,
            end_date: self.end_date,
            features,
        })
    }
}

impl Default for Summarizer {
    fn default() -> Self {
        Summarizer::new()
    }
}

#[derive(Serialize)]
pub struct SummaryOutput {
    kind: &'static str,
    #[serde(rename = "startDate")]
    start_date: i64,
    #[serde(rename = "endDate")]
    end_date: i64,
    features: HashMap<String, FeatureSummary>,
}

#[derive(Serialize)]
struct FeatureSummary {
    default: Value,
    counters: Vec<VariationCounter>,
}

#[derive(Serialize)]
struct VariationCounter {
    #[serde(skip_serializing_if = "Option::is_none")]
    variation: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    value: Value,
    count: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    unknown: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_model::Context;

    fn sample(key: &str, variation: Option<usize>) -> FeatureRequestEvent {
        sample_with_default(key, variation, Value::from_bool(false))
    }

    fn sample_with_default(key: &str, variation: Option<usize>, default: Value) -> FeatureRequestEvent {
        FeatureRequestEvent {
            creation_date: 1000,
            key: key.to_string(),
            context: Context::new("u1"),
            value: Value::from_bool(true),
            variation,
            default,
            version: Some(3),
            prereq_of: None,
            reason: None,
            track_events: false,
            debug_events_until_date: None,
        }
    }

    #[test]
    fn repeated_evaluations_collapse_into_one_counter() {
        let mut summarizer = Summarizer::new();
        summarizer.note(&sample("flag-a", Some(0)));
        summarizer.note(&sample("flag-a", Some(0)));
        summarizer.note(&sample("flag-a", Some(1)));
        let output = summarizer.flush().unwrap();
        let feature = &output.features["flag-a"];
        assert_eq!(feature.counters.len(), 2);
        let zero = feature.counters.iter().find(|c| c.variation == Some(0)).unwrap();
        assert_eq!(zero.count, 2);
    }

    #[test]
    fn flush_with_no_events_returns_none() {
        let mut summarizer = Summarizer::new();
        assert!(summarizer.flush().is_none());
    }

    #[test]
    fn differing_defaults_for_same_flag_and_variation_get_distinct_counters() {
        let mut summarizer = Summarizer::new();
        summarizer.note(&sample_with_default("flag-a", Some(0), Value::from_bool(false)));
        summarizer.note(&sample_with_default("flag-a", Some(0), Value::from_bool(true)));
        summarizer.note(&sample_with_default("flag-a", Some(0), Value::from_bool(false)));
        let output = summarizer.flush().unwrap();
        let feature = &output.features["flag-a"];
        assert_eq!(feature.counters.len(), 2);
        let total: u64 = feature.counters.iter().map(|c| c.count).sum();
        assert_eq!(total, 3);
    }
}
