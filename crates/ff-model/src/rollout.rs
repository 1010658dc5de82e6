use serde::{Deserialize, Serialize};

use crate::context::AttributeRef;

/// One slice of a rollout: `weight` is out of 100_000; the last entry absorbs
/// any remainder so weights need not sum exactly to 100_000.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeightedVariation {
    pub variation: usize,
    pub weight: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RolloutKind {
    Rollout,
    Experiment,
}

impl Default for RolloutKind {
    fn default() -> Self {
        RolloutKind::Rollout
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<AttributeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default)]
    pub kind: RolloutKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<String>,
}

/// Either a fixed variation index or a weighted rollout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariationOrRollout {
    Variation { variation: usize },
    Rollout { rollout: Rollout },
}

impl VariationOrRollout {
    pub fn fixed(variation: usize) -> VariationOrRollout {
        VariationOrRollout::Variation { variation }
    }

    pub fn rollout(rollout: Rollout) -> VariationOrRollout {
        VariationOrRollout::Rollout { rollout }
    }
}
