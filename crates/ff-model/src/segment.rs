use serde::{Deserialize, Serialize};

use crate::clause::Clause;
use crate::context::AttributeRef;

/// An include/exclude list scoped to one context kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentTarget {
    #[serde(default)]
    pub context_kind: Option<String>,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentRule {
    pub clauses: Vec<Clause>,
    /// Weighted ("percentage") segment membership; `None` means the rule
    /// matches unconditionally once its clauses pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<AttributeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_context_kind: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub included_contexts: Vec<SegmentTarget>,
    #[serde(default)]
    pub excluded_contexts: Vec<SegmentTarget>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub salt: String,
    /// A "big segment" whose membership is fetched from an external store.
    #[serde(default)]
    pub unbounded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbounded_context_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
}

impl Segment {
    pub fn tombstone(key: impl Into<String>, version: u64) -> Segment {
        Segment {
            key: key.into(),
            version,
            included: Vec::new(),
            excluded: Vec::new(),
            included_contexts: Vec::new(),
            excluded_contexts: Vec::new(),
            rules: Vec::new(),
            salt: String::new(),
            unbounded: false,
            unbounded_context_kind: None,
            generation: None,
            deleted: true,
        }
    }

    /// `segmentKey + ":" + generation`, the key big-segment stores index
    /// membership by.
    pub fn big_segment_ref(&self) -> Option<String> {
        self.generation.map(|g| format!("{}:{}", self.key, g))
    }
}
