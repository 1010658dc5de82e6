use ff_model::{
    EvalDetail, ErrorKind, Flag, MultiContext, Reason, Rollout, RolloutKind, Value, VariationOrRollout,
    DEFAULT_KIND,
};

use crate::big_segments::BigSegmentStore;
use crate::bucketing::{bucket_value, rollout_prefix, variation_for_bucket};
use crate::clause_eval::clause_matches;
use crate::segment_eval::{SegmentEvaluator, SegmentSource};

/// Looks up a [`Flag`] by key, the way a prerequisite reference is resolved.
pub trait FlagSource {
    fn flag(&self, key: &str) -> Option<Flag>;
}

#[derive(Clone, Debug)]
pub struct PrerequisiteEvaluation {
    pub flag: Flag,
    pub flag_key: String,
    pub detail: EvalDetail<Value>,
}

pub struct EvalResult {
    pub detail: EvalDetail<Value>,
    pub prerequisite_evaluations: Vec<PrerequisiteEvaluation>,
    pub big_segments_unavailable: bool,
}

enum PrereqOutcome {
    Satisfied,
    Failed(String),
    Malformed,
}

pub struct Evaluator<'a, F: FlagSource, S: SegmentSource> {
    flags: &'a F,
    segments: SegmentEvaluator<'a, S>,
}

impl<'a, F: FlagSource, S: SegmentSource> Evaluator<'a, F, S> {
    pub fn new(flags: &'a F, segments: &'a S, big_segments: Option<&'a dyn BigSegmentStore>) -> Evaluator<'a, F, S> {
        Evaluator {
            flags,
            segments: SegmentEvaluator::new(segments, big_segments),
        }
    }

    pub fn evaluate(&mut self, flag: &Flag, multi: &MultiContext) -> EvalResult {
        let mut path = Vec::new();
        let mut events = Vec::new();
        let detail = self.evaluate_internal(flag, multi, &mut path, &mut events);
        EvalResult {
            detail,
            prerequisite_evaluations: events,
            big_segments_unavailable: self.segments.big_segment_unavailable(),
        }
    }

    fn evaluate_internal(
        &mut self,
        flag: &Flag,
        multi: &MultiContext,
        path: &mut Vec<String>,
        events: &mut Vec<PrerequisiteEvaluation>,
    ) -> EvalDetail<Value> {
        if flag.deleted {
            return error_detail(ErrorKind::FlagNotFound);
        }
        if !multi.is_valid() {
            return error_detail(ErrorKind::UserNotSpecified);
        }
        if path.contains(&flag.key) {
            return error_detail(ErrorKind::MalformedFlag);
        }
        path.push(flag.key.clone());
        let result = self.evaluate_on(flag, multi, path, events);
        path.pop();
        result
    }

    fn evaluate_on(
        &mut self,
        flag: &Flag,
        multi: &MultiContext,
        path: &mut Vec<String>,
        events: &mut Vec<PrerequisiteEvaluation>,
    ) -> EvalDetail<Value> {
        if !flag.on {
            return self.off_detail(flag);
        }

        match self.check_prerequisites(flag, multi, path, events) {
            PrereqOutcome::Malformed => return error_detail(ErrorKind::MalformedFlag),
            PrereqOutcome::Failed(key) => {
                return self.variation_detail(flag, flag.off_variation, Reason::PrerequisiteFailed { prerequisite_key: key })
            }
            PrereqOutcome::Satisfied => {}
        }

        if let Some(detail) = self.target_match(flag, multi) {
            return detail;
        }

        for (index, rule) in flag.rules.iter().enumerate() {
            let all_match = rule.clauses.iter().all(|clause| {
                let mut segment_match = |key: &str| self.segments.matches(key, multi);
                clause_matches(clause, multi, &mut segment_match)
            });
            if all_match {
                let rule_id = rule.id.clone();
                return self.variation_or_rollout_detail(flag, &rule.variation_or_rollout, multi, |in_experiment| {
                    Reason::RuleMatch {
                        rule_index: index,
                        rule_id,
                        in_experiment,
                    }
                });
            }
        }

        self.variation_or_rollout_detail(flag, &flag.fallthrough, multi, |in_experiment| Reason::Fallthrough { in_experiment })
    }

    fn check_prerequisites(
        &mut self,
        flag: &Flag,
        multi: &MultiContext,
        path: &mut Vec<String>,
        events: &mut Vec<PrerequisiteEvaluation>,
    ) -> PrereqOutcome {
        for prereq in &flag.prerequisites {
            let Some(prereq_flag) = self.flags.flag(&prereq.key) else {
                return PrereqOutcome::Failed(prereq.key.clone());
            };
            if prereq_flag.deleted {
                return PrereqOutcome::Failed(prereq.key.clone());
            }
            let detail = self.evaluate_internal(&prereq_flag, multi, path, events);
            let satisfied = prereq_flag.on && detail.variation_index == Some(prereq.variation);
            let errored = detail.reason.is_error();
            events.push(PrerequisiteEvaluation {
                flag: prereq_flag.clone(),
                flag_key: prereq.key.clone(),
                detail,
            });
            if errored {
                return PrereqOutcome::Malformed;
            }
            if !satisfied {
                return PrereqOutcome::Failed(prereq.key.clone());
            }
        }
        PrereqOutcome::Satisfied
    }

    fn target_match(&self, flag: &Flag, multi: &MultiContext) -> Option<EvalDetail<Value>> {
        for target in &flag.targets {
            let kind = target.context_kind.as_deref().unwrap_or(DEFAULT_KIND);
            if let Some(context) = multi.get(kind).or_else(|| multi.default_context()) {
                if target.values.iter().any(|v| v == &context.key) {
                    return Some(self.variation_detail(flag, Some(target.variation), Reason::TargetMatch));
                }
            }
        }
        None
    }

    fn variation_or_rollout_detail(
        &self,
        flag: &Flag,
        vr: &VariationOrRollout,
        multi: &MultiContext,
        reason_fn: impl FnOnce(bool) -> Reason,
    ) -> EvalDetail<Value> {
        match vr {
            VariationOrRollout::Variation { variation } => self.variation_detail(flag, Some(*variation), reason_fn(false)),
            VariationOrRollout::Rollout { rollout } => self.rollout_detail(flag, rollout, multi, reason_fn),
        }
    }

    fn rollout_detail(
        &self,
        flag: &Flag,
        rollout: &Rollout,
        multi: &MultiContext,
        reason_fn: impl FnOnce(bool) -> Reason,
    ) -> EvalDetail<Value> {
        if rollout.variations.is_empty() {
            return error_detail(ErrorKind::MalformedFlag);
        }
        let kind = rollout.context_kind.as_deref().unwrap_or(DEFAULT_KIND);
        let context = multi.get(kind).or_else(|| multi.default_context());
        let bucketing_value = context.and_then(|c| match &rollout.bucket_by {
            Some(attr) => c.get(attr).and_then(|v| v.as_bucketable_string()),
            None => Some(c.bucketing_key_default()),
        });
        // A missing or non-stringifiable bucketing attribute buckets to 0
        // rather than hashing an empty string into a pseudo-random bucket.
        let bucket = match bucketing_value {
            Some(value) => {
                let prefix = rollout_prefix(&flag.key, &flag.salt, rollout.seed);
                bucket_value(&prefix, &value)
            }
            None => 0.0,
        };
        let weights: Vec<(usize, u32)> = rollout.variations.iter().map(|w| (w.variation, w.weight)).collect();
        let Some(variation) = variation_for_bucket(&weights, bucket) else {
            return error_detail(ErrorKind::MalformedFlag);
        };
        let total_weight: u32 = weights.iter().map(|(_, w)| w).sum();
        let in_experiment = matches!(rollout.kind, RolloutKind::Experiment) && bucket < (total_weight as f64 / 100_000.0);
        self.variation_detail(flag, Some(variation), reason_fn(in_experiment))
    }

    fn off_detail(&self, flag: &Flag) -> EvalDetail<Value> {
        self.variation_detail(flag, flag.off_variation, Reason::Off)
    }

    fn variation_detail(&self, flag: &Flag, variation: Option<usize>, reason: Reason) -> EvalDetail<Value> {
        match variation {
            None => EvalDetail::new(Value::Null, None, reason),
            Some(index) => match flag.variation_value(index) {
                Some(value) => EvalDetail::new(value.clone(), Some(index), reason),
                None => error_detail(ErrorKind::MalformedFlag),
            },
        }
    }
}

fn error_detail(kind: ErrorKind) -> EvalDetail<Value> {
    EvalDetail::new(Value::Null, None, Reason::error(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_eval::SegmentSource;
    use ff_model::{Clause, Context, Operator, Prerequisite, Rule, Segment, Target, WeightedVariation};
    use std::collections::HashMap;

    struct FixedFlags(HashMap<String, Flag>);

    impl FlagSource for FixedFlags {
        fn flag(&self, key: &str) -> Option<Flag> {
            self.0.get(key).cloned()
        }
    }

    struct NoSegments;

    impl SegmentSource for NoSegments {
        fn segment(&self, _key: &str) -> Option<Segment> {
            None
        }
    }

    fn base_flag(key: &str) -> Flag {
        Flag {
            key: key.to_string(),
            version: 1,
            on: true,
            prerequisites: Vec::new(),
            targets: Vec::new(),
            rules: Vec::new(),
            fallthrough: VariationOrRollout::fixed(0),
            off_variation: Some(1),
            variations: vec![Value::from_bool(true), Value::from_bool(false)],
            salt: "salt".to_string(),
            migration: None,
            track_events: false,
            debug_events_until_date: None,
            client_side_available: false,
            deleted: false,
        }
    }

    #[test]
    fn off_flag_returns_off_variation() {
        let mut flag = base_flag("f");
        flag.on = false;
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(result.detail.variation_index, Some(1));
        assert_eq!(result.detail.reason, Reason::Off);
    }

    #[test]
    fn target_match_wins_over_rules() {
        let mut flag = base_flag("f");
        flag.targets.push(Target {
            context_kind: None,
            variation: 0,
            values: vec!["u1".to_string()],
        });
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(result.detail.reason, Reason::TargetMatch);
        assert_eq!(result.detail.variation_index, Some(0));
    }

    #[test]
    fn rule_match_uses_first_passing_rule() {
        let mut flag = base_flag("f");
        flag.rules.push(Rule {
            clauses: vec![Clause {
                attribute: ff_model::AttributeRef::new("email"),
                op: Operator::In,
                values: vec![Value::from_str("a@example.com")],
                negate: false,
                context_kind: None,
            }],
            variation_or_rollout: VariationOrRollout::fixed(0),
            id: "rule-1".to_string(),
            track_events: false,
        });
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let ctx = Context::new("u1").with_attribute("email", Value::from_str("a@example.com"));
        let multi = MultiContext::single(ctx);
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(
            result.detail.reason,
            Reason::RuleMatch {
                rule_index: 0,
                rule_id: "rule-1".to_string(),
                in_experiment: false,
            }
        );
    }

    #[test]
    fn failed_prerequisite_returns_off_variation_with_reason() {
        let mut flag = base_flag("f");
        flag.prerequisites.push(Prerequisite {
            key: "dep".to_string(),
            variation: 0,
        });
        let mut dep = base_flag("dep");
        dep.on = true;
        dep.fallthrough = VariationOrRollout::fixed(1);
        let mut flags_map = HashMap::new();
        flags_map.insert("dep".to_string(), dep);
        let flags = FixedFlags(flags_map);
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(
            result.detail.reason,
            Reason::PrerequisiteFailed {
                prerequisite_key: "dep".to_string()
            }
        );
        assert_eq!(result.prerequisite_evaluations.len(), 1);
    }

    #[test]
    fn prerequisite_cycle_is_malformed_not_a_stack_overflow() {
        let mut flag_a = base_flag("a");
        flag_a.prerequisites.push(Prerequisite {
            key: "b".to_string(),
            variation: 0,
        });
        let mut flag_b = base_flag("b");
        flag_b.prerequisites.push(Prerequisite {
            key: "a".to_string(),
            variation: 0,
        });
        let mut flags_map = HashMap::new();
        flags_map.insert("a".to_string(), flag_a.clone());
        flags_map.insert("b".to_string(), flag_b);
        let flags = FixedFlags(flags_map);
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let result = eval.evaluate(&flag_a, &multi);
        assert_eq!(result.detail.reason, Reason::error(ErrorKind::MalformedFlag));
    }

    #[test]
    fn empty_rollout_variations_is_malformed() {
        let mut flag = base_flag("f");
        flag.fallthrough = VariationOrRollout::rollout(Rollout {
            variations: Vec::new(),
            bucket_by: None,
            seed: None,
            kind: RolloutKind::Rollout,
            context_kind: None,
        });
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(result.detail.reason, Reason::error(ErrorKind::MalformedFlag));
    }

    #[test]
    fn invalid_context_is_user_not_specified() {
        let flag = base_flag("f");
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new(""));
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(result.detail.reason, Reason::error(ErrorKind::UserNotSpecified));
    }

    #[test]
    fn fallthrough_rollout_picks_a_variation_deterministically() {
        let mut flag = base_flag("f");
        flag.fallthrough = VariationOrRollout::rollout(Rollout {
            variations: vec![
                WeightedVariation { variation: 0, weight: 50_000 },
                WeightedVariation { variation: 1, weight: 50_000 },
            ],
            bucket_by: None,
            seed: None,
            kind: RolloutKind::Rollout,
            context_kind: None,
        });
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let first = eval.evaluate(&flag, &multi);
        let second = eval.evaluate(&flag, &multi);
        assert_eq!(first.detail.variation_index, second.detail.variation_index);
    }

    #[test]
    fn missing_bucket_by_attribute_buckets_to_first_variation() {
        let mut flag = base_flag("f");
        flag.fallthrough = VariationOrRollout::rollout(Rollout {
            variations: vec![
                WeightedVariation { variation: 0, weight: 1 },
                WeightedVariation { variation: 1, weight: 99_999 },
            ],
            bucket_by: Some(ff_model::AttributeRef::new("missing")),
            seed: None,
            kind: RolloutKind::Rollout,
            context_kind: None,
        });
        let flags = FixedFlags(HashMap::new());
        let segments = NoSegments;
        let mut eval = Evaluator::new(&flags, &segments, None);
        let multi = MultiContext::single(Context::new("u1"));
        let result = eval.evaluate(&flag, &multi);
        assert_eq!(result.detail.variation_index, Some(0));
    }
}
