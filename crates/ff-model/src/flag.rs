use serde::{Deserialize, Serialize};

use crate::rollout::VariationOrRollout;
use crate::{Clause, Value};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub context_kind: Option<String>,
    pub variation: usize,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub track_events: bool,
}

/// Migration-flag specific parameters, present only on flags whose
/// variations are migration stage strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_ratio: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_ratio: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flag {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub fallthrough: VariationOrRollout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_variation: Option<usize>,
    pub variations: Vec<Value>,
    #[serde(default)]
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationParams>,
    #[serde(default)]
    pub track_events: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_events_until_date: Option<i64>,
    #[serde(default)]
    pub client_side_available: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Flag {
    pub fn tombstone(key: impl Into<String>, version: u64) -> Flag {
        Flag {
            key: key.into(),
            version,
            on: false,
            prerequisites: Vec::new(),
            targets: Vec::new(),
            rules: Vec::new(),
            fallthrough: VariationOrRollout::fixed(0),
            off_variation: None,
            variations: Vec::new(),
            salt: String::new(),
            migration: None,
            track_events: false,
            debug_events_until_date: None,
            client_side_available: false,
            deleted: true,
        }
    }

    pub fn variation_value(&self, index: usize) -> Option<&Value> {
        self.variations.get(index)
    }

    pub fn is_debugging_enabled(&self, now_millis: i64) -> bool {
        self.debug_events_until_date
            .map(|until| now_millis < until)
            .unwrap_or(false)
    }
}
