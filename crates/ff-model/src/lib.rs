//! Immutable data model shared by the store, evaluator, data source, event
//! pipeline and client façade crates: [`Value`], [`Context`]/[`MultiContext`],
//! [`Flag`], [`Segment`], [`Clause`], [`Rule`], rollouts, and evaluation
//! [`Reason`]s.

mod clause;
mod context;
mod flag;
mod kind;
mod reason;
mod rollout;
mod segment;
mod value;

pub use clause::{Clause, Operator};
pub use context::{AttributeRef, Context, MultiContext, DEFAULT_KIND};
pub use flag::{Flag, MigrationParams, Prerequisite, Rule, Target};
pub use kind::{AllData, DataKind, Item};
pub use reason::{ErrorKind, EvalDetail, Reason};
pub use rollout::{Rollout, RolloutKind, VariationOrRollout, WeightedVariation};
pub use segment::{Segment, SegmentRule, SegmentTarget};
pub use value::Value;
