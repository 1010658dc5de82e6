use std::collections::HashSet;

use ff_model::{AttributeRef, MultiContext, Segment, SegmentTarget};

use crate::big_segments::{context_hash, BigSegmentError, BigSegmentStore};
use crate::bucketing::{bucket_value, rollout_prefix, variation_for_bucket};
use crate::clause_eval::clause_matches;

/// Looks up a [`Segment`] by key; returns `None` for an unknown or deleted
/// segment, matching how clauses treat a dangling `segmentMatch` reference
/// (no match rather than an error).
pub trait SegmentSource {
    fn segment(&self, key: &str) -> Option<Segment>;
}

pub struct SegmentEvaluator<'a, S: SegmentSource> {
    source: &'a S,
    big_segments: Option<&'a dyn BigSegmentStore>,
    big_segment_unavailable: bool,
}

impl<'a, S: SegmentSource> SegmentEvaluator<'a, S> {
    pub fn new(source: &'a S, big_segments: Option<&'a dyn BigSegmentStore>) -> SegmentEvaluator<'a, S> {
        SegmentEvaluator {
            source,
            big_segments,
            big_segment_unavailable: false,
        }
    }

    /// Whether a big-segments lookup errored during this evaluation. The
    /// caller surfaces this as `BIG_SEGMENTS_STORE_ERROR` on the reason
    /// without failing the evaluation outright.
    pub fn big_segment_unavailable(&self) -> bool {
        self.big_segment_unavailable
    }

    pub fn matches(&mut self, segment_key: &str, multi: &MultiContext) -> bool {
        let mut visited = HashSet::new();
        self.matches_inner(segment_key, multi, &mut visited)
    }

    fn matches_inner(&mut self, segment_key: &str, multi: &MultiContext, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(segment_key.to_string()) {
            return false;
        }
        let Some(segment) = self.source.segment(segment_key) else {
            return false;
        };
        if segment.deleted {
            return false;
        }

        let kind = segment
            .unbounded_context_kind
            .as_deref()
            .unwrap_or(ff_model::DEFAULT_KIND);
        let Some(context) = multi.get(kind).or_else(|| multi.default_context()) else {
            return false;
        };

        if target_contains(&segment.included, &segment.included_contexts, kind, &context.key) {
            return true;
        }
        if target_contains(&segment.excluded, &segment.excluded_contexts, kind, &context.key) {
            return false;
        }

        if segment.unbounded {
            match self.big_segment_membership(&segment, kind, &context.key) {
                Some(explicit) => return explicit,
                None => { /* unknown: fall through to rules */ }
            }
        }

        for rule in &segment.rules {
            if !rule.clauses.iter().all(|clause| {
                let mut segment_match = |key: &str| self.matches_inner(key, multi, visited);
                clause_matches(clause, multi, &mut segment_match)
            }) {
                continue;
            }

            let weighted_match = match rule.weight {
                None => true,
                Some(weight) => {
                    let rule_kind = rule.rollout_context_kind.as_deref().unwrap_or(ff_model::DEFAULT_KIND);
                    let rule_context = multi.get(rule_kind).or(Some(context));
                    let bucketing_value = rule_context.and_then(|c| match &rule.bucket_by {
                        Some(attr) => c.get(attr).and_then(|v| v.as_bucketable_string()),
                        None => Some(c.bucketing_key_default()),
                    });
                    // A missing or non-stringifiable bucketing attribute buckets to 0
                    // rather than hashing an empty string into a pseudo-random bucket.
                    let bucket = match bucketing_value {
                        Some(value) => {
                            let prefix = rollout_prefix(&segment.key, &segment.salt, None);
                            bucket_value(&prefix, &value)
                        }
                        None => 0.0,
                    };
                    variation_for_bucket(&[(0, weight), (1, 100_000 - weight.min(100_000))], bucket) == Some(0)
                }
            };

            if weighted_match {
                return true;
            }
        }

        false
    }

    fn big_segment_membership(&mut self, segment: &Segment, kind: &str, key: &str) -> Option<bool> {
        let store = self.big_segments?;
        let segment_ref = segment.big_segment_ref()?;
        let hash = context_hash(kind, key);
        match store.get_membership(&hash) {
            Ok(membership) => membership.get(&segment_ref).copied(),
            Err(BigSegmentError::Unavailable(_)) => {
                self.big_segment_unavailable = true;
                None
            }
        }
    }
}

fn target_contains(flat: &[String], scoped: &[SegmentTarget], kind: &str, key: &str) -> bool {
    if kind == ff_model::DEFAULT_KIND && flat.iter().any(|k| k == key) {
        return true;
    }
    scoped.iter().any(|target| {
        let target_kind = target.context_kind.as_deref().unwrap_or(ff_model::DEFAULT_KIND);
        target_kind == kind && target.values.iter().any(|v| v == key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_model::Context;
    use std::collections::HashMap;

    struct FixedSegments(HashMap<String, Segment>);

    impl SegmentSource for FixedSegments {
        fn segment(&self, key: &str) -> Option<Segment> {
            self.0.get(key).cloned()
        }
    }

    fn segment(key: &str) -> Segment {
        Segment {
            key: key.to_string(),
            version: 1,
            included: Vec::new(),
            excluded: Vec::new(),
            included_contexts: Vec::new(),
            excluded_contexts: Vec::new(),
            rules: Vec::new(),
            salt: "salt".to_string(),
            unbounded: false,
            unbounded_context_kind: None,
            generation: None,
            deleted: false,
        }
    }

    #[test]
    fn included_list_wins_over_absence() {
        let mut seg = segment("beta-users");
        seg.included.push("u1".to_string());
        let mut segments = HashMap::new();
        segments.insert("beta-users".to_string(), seg);
        let source = FixedSegments(segments);
        let mut eval = SegmentEvaluator::new(&source, None);
        let multi = MultiContext::single(Context::new("u1"));
        assert!(eval.matches("beta-users", &multi));
    }

    #[test]
    fn excluded_list_beats_rules() {
        let mut seg = segment("beta-users");
        seg.excluded.push("u1".to_string());
        let mut segments = HashMap::new();
        segments.insert("beta-users".to_string(), seg);
        let source = FixedSegments(segments);
        let mut eval = SegmentEvaluator::new(&source, None);
        let multi = MultiContext::single(Context::new("u1"));
        assert!(!eval.matches("beta-users", &multi));
    }

    #[test]
    fn unknown_segment_key_is_not_a_match() {
        let source = FixedSegments(HashMap::new());
        let mut eval = SegmentEvaluator::new(&source, None);
        let multi = MultiContext::single(Context::new("u1"));
        assert!(!eval.matches("missing-segment", &multi));
    }

    #[test]
    fn self_referential_rule_does_not_infinite_loop() {
        use ff_model::{Clause, Operator, SegmentRule};
        let mut seg = segment("cyclic");
        seg.rules.push(SegmentRule {
            clauses: vec![Clause {
                attribute: AttributeRef::new("key"),
                op: Operator::SegmentMatch,
                values: vec![ff_model::Value::from_str("cyclic")],
                negate: false,
                context_kind: None,
            }],
            weight: None,
            bucket_by: None,
            rollout_context_kind: None,
        });
        let mut segments = HashMap::new();
        segments.insert("cyclic".to_string(), seg);
        let source = FixedSegments(segments);
        let mut eval = SegmentEvaluator::new(&source, None);
        let multi = MultiContext::single(Context::new("u1"));
        assert!(!eval.matches("cyclic", &multi));
    }

    #[test]
    fn deleted_segment_never_matches() {
        let mut seg = segment("gone");
        seg.deleted = true;
        seg.included.push("u1".to_string());
        let mut segments = HashMap::new();
        segments.insert("gone".to_string(), seg);
        let source = FixedSegments(segments);
        let mut eval = SegmentEvaluator::new(&source, None);
        let multi = MultiContext::single(Context::new("u1"));
        assert!(!eval.matches("gone", &multi));
    }
}
