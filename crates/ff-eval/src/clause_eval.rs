use ff_model::{AttributeRef, Clause, MultiContext, Operator, Value};

/// Evaluates one clause against a context. `segment_match` resolves
/// `segmentMatch` operands (a list of segment keys) to membership, and is
/// responsible for its own recursion/cycle-guarding.
pub fn clause_matches(
    clause: &Clause,
    multi: &MultiContext,
    segment_match: &mut dyn FnMut(&str) -> bool,
) -> bool {
    let matched = if clause.op == Operator::SegmentMatch {
        clause
            .values
            .iter()
            .filter_map(|v| v.as_str())
            .any(|key| segment_match(key))
    } else {
        match resolve_attribute(clause, multi) {
            Some(value) => match &value {
                Value::Array(items) => items
                    .iter()
                    .any(|item| clause.values.iter().any(|cv| op_matches(clause.op, item, cv))),
                other => clause.values.iter().any(|cv| op_matches(clause.op, other, cv)),
            },
            // Missing attribute never matches, negated or not.
            None => return false,
        }
    };

    if clause.negate {
        !matched
    } else {
        matched
    }
}

fn resolve_attribute(clause: &Clause, multi: &MultiContext) -> Option<Value> {
    let kind = clause.context_kind.as_deref().unwrap_or(ff_model::DEFAULT_KIND);
    let context = multi.get(kind).or_else(|| multi.default_context())?;
    context.get(&AttributeRef::new(&clause.attribute.as_raw()))
}

fn op_matches(op: Operator, attr: &Value, clause_value: &Value) -> bool {
    match op {
        Operator::In => attr == clause_value,
        Operator::EndsWith => str_pair(attr, clause_value).map_or(false, |(a, b)| a.ends_with(b)),
        Operator::StartsWith => str_pair(attr, clause_value).map_or(false, |(a, b)| a.starts_with(b)),
        Operator::Contains => str_pair(attr, clause_value).map_or(false, |(a, b)| a.contains(b)),
        Operator::Matches => str_pair(attr, clause_value).map_or(false, |(a, pattern)| {
            regex::Regex::new(pattern).map(|re| re.is_match(a)).unwrap_or(false)
        }),
        Operator::LessThan => num_pair(attr, clause_value).map_or(false, |(a, b)| a < b),
        Operator::LessThanOrEqual => num_pair(attr, clause_value).map_or(false, |(a, b)| a <= b),
        Operator::GreaterThan => num_pair(attr, clause_value).map_or(false, |(a, b)| a > b),
        Operator::GreaterThanOrEqual => num_pair(attr, clause_value).map_or(false, |(a, b)| a >= b),
        Operator::Before => date_pair(attr, clause_value).map_or(false, |(a, b)| a < b),
        Operator::After => date_pair(attr, clause_value).map_or(false, |(a, b)| a > b),
        Operator::SemVerEqual => semver_pair(attr, clause_value).map_or(false, |(a, b)| a == b),
        Operator::SemVerLessThan => semver_pair(attr, clause_value).map_or(false, |(a, b)| a < b),
        Operator::SemVerGreaterThan => semver_pair(attr, clause_value).map_or(false, |(a, b)| a > b),
        Operator::SegmentMatch => false, // handled in clause_matches
        Operator::Unknown => false,
    }
}

fn str_pair<'a>(a: &'a Value, b: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((a.as_str()?, b.as_str()?))
}

fn num_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((a.as_f64()?, b.as_f64()?))
}

fn date_pair(a: &Value, b: &Value) -> Option<(i64, i64)> {
    Some((parse_date_millis(a)?, parse_date_millis(b)?))
}

fn parse_date_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => Some(*n as i64),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

fn semver_pair(a: &Value, b: &Value) -> Option<(semver::Version, semver::Version)> {
    Some((parse_semver(a)?, parse_semver(b)?))
}

fn parse_semver(value: &Value) -> Option<semver::Version> {
    let s = value.as_str()?;
    semver::Version::parse(s.trim_start_matches('v')).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_model::Context;

    fn no_segments(_: &str) -> bool {
        false
    }

    #[test]
    fn missing_attribute_never_matches_even_negated() {
        let clause = Clause {
            attribute: AttributeRef::new("missing"),
            op: Operator::In,
            values: vec![Value::from_str("x")],
            negate: true,
            context_kind: None,
        };
        let multi = MultiContext::single(Context::new("u1"));
        assert!(!clause_matches(&clause, &multi, &mut no_segments));
    }

    #[test]
    fn array_attribute_matches_any_element() {
        let clause = Clause {
            attribute: AttributeRef::new("groups"),
            op: Operator::In,
            values: vec![Value::from_str("beta")],
            negate: false,
            context_kind: None,
        };
        let ctx = Context::new("u1").with_attribute(
            "groups",
            Value::Array(vec![Value::from_str("alpha"), Value::from_str("beta")]),
        );
        let multi = MultiContext::single(ctx);
        assert!(clause_matches(&clause, &multi, &mut no_segments));
    }

    #[test]
    fn unknown_operator_is_false_not_an_error() {
        let clause = Clause {
            attribute: AttributeRef::new("key"),
            op: Operator::Unknown,
            values: vec![Value::from_str("u1")],
            negate: false,
            context_kind: None,
        };
        let multi = MultiContext::single(Context::new("u1"));
        assert!(!clause_matches(&clause, &multi, &mut no_segments));
    }

    #[test]
    fn semver_greater_than() {
        let clause = Clause {
            attribute: AttributeRef::new("version"),
            op: Operator::SemVerGreaterThan,
            values: vec![Value::from_str("2.0.0")],
            negate: false,
            context_kind: None,
        };
        let ctx = Context::new("u1").with_attribute("version", Value::from_str("2.0.1"));
        let multi = MultiContext::single(ctx);
        assert!(clause_matches(&clause, &multi, &mut no_segments));
    }

    #[test]
    fn segment_match_ors_across_listed_segments() {
        let clause = Clause {
            attribute: AttributeRef::new("key"),
            op: Operator::SegmentMatch,
            values: vec![Value::from_str("seg-a"), Value::from_str("seg-b")],
            negate: false,
            context_kind: None,
        };
        let multi = MultiContext::single(Context::new("u1"));
        let mut matcher = |key: &str| key == "seg-b";
        assert!(clause_matches(&clause, &multi, &mut matcher));
    }
}
