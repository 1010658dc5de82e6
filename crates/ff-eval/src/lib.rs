//! The deterministic evaluation engine: clause matching, percentage
//! rollouts, segment membership (including big segments), and the main
//! flag evaluation algorithm with prerequisite resolution.

mod big_segments;
mod bucketing;
mod clause_eval;
mod evaluator;
mod segment_eval;
mod store_adapter;

pub use big_segments::{context_hash, BigSegmentError, BigSegmentMetadata, BigSegmentStore};
pub use bucketing::{bucket_value, rollout_prefix, variation_for_bucket};
pub use clause_eval::clause_matches;
pub use evaluator::{EvalResult, Evaluator, FlagSource, PrerequisiteEvaluation};
pub use segment_eval::{SegmentEvaluator, SegmentSource};
pub use store_adapter::StoreAdapter;
