use sha1::{Digest, Sha1};

/// The first 15 hex digits of a SHA-1 digest, read as an integer and
/// divided by this, yields a bucket in `[0, 1)`.
const LONG_SCALE: u64 = 0xFFF_FFFF_FFFF_FFFF;

/// Computes the deterministic bucket value for a context in `[0, 1)`.
///
/// `prefix` is either the stringified rollout `seed`, or `"{flag_key}.{salt}"`
/// when there is no seed. `bucketing_value` is the stringified attribute
/// being bucketed by (already including any secondary-key suffix).
pub fn bucket_value(prefix: &str, bucketing_value: &str) -> f64 {
    let hash_input = format!("{prefix}.{bucketing_value}");
    let digest = Sha1::digest(hash_input.as_bytes());
    let hex = hex_encode(&digest);
    let first15 = &hex[0..15];
    let as_int = u64::from_str_radix(first15, 16).expect("15 hex chars fit in u64");
    as_int as f64 / LONG_SCALE as f64
}

pub fn rollout_prefix(flag_key: &str, salt: &str, seed: Option<i64>) -> String {
    match seed {
        Some(seed) => seed.to_string(),
        None => format!("{flag_key}.{salt}"),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{:02x}", b).unwrap();
    }
    out
}

/// Walks cumulative weights (out of 100_000) and returns the index of the
/// first variation whose cumulative weight strictly exceeds `bucket`. Any
/// weight shortfall (weights summing to less than 100_000) is implicitly
/// absorbed by the last variation, since it is the final candidate checked.
pub fn variation_for_bucket(weights: &[(usize, u32)], bucket: f64) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let mut cumulative: f64 = 0.0;
    for &(variation, weight) in weights {
        cumulative += weight as f64 / 100_000.0;
        if bucket < cumulative {
            return Some(variation);
        }
    }
    weights.last().map(|&(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Known-answer vectors: flag "hashKey", salt "saltyA", bucket-by key.
    fn assert_bucket(user_key: &str, expected: f64) {
        let prefix = rollout_prefix("hashKey", "saltyA", None);
        let bucket = bucket_value(&prefix, user_key);
        assert!(
            (bucket - expected).abs() < 1e-6,
            "bucket for {user_key} was {bucket}, expected {expected}"
        );
    }

    #[test]
    fn percentage_rollout_stability() {
        assert_bucket("userKeyA", 0.42157587);
        assert_bucket("userKeyB", 0.6708485);
        assert_bucket("userKeyC", 0.10343106);
    }

    #[test]
    fn first_cumulative_weight_strictly_greater_wins() {
        let weights = vec![(0, 60_000), (1, 40_000)];
        assert_eq!(variation_for_bucket(&weights, 0.1), Some(0));
        assert_eq!(variation_for_bucket(&weights, 0.59999), Some(0));
        assert_eq!(variation_for_bucket(&weights, 0.60001), Some(1));
    }

    #[test]
    fn shortfall_weights_fall_to_last_variation() {
        let weights = vec![(0, 10_000), (1, 10_000)];
        assert_eq!(variation_for_bucket(&weights, 0.99), Some(1));
    }

    #[quickcheck_macros::quickcheck]
    fn bucket_is_deterministic(key: String, salt: String, value: String) -> bool {
        let prefix = rollout_prefix(&key, &salt, None);
        bucket_value(&prefix, &value) == bucket_value(&prefix, &value)
    }

    #[quickcheck_macros::quickcheck]
    fn bucket_is_always_in_unit_interval(key: String, salt: String, value: String) -> bool {
        let prefix = rollout_prefix(&key, &salt, None);
        let b = bucket_value(&prefix, &value);
        (0.0..1.0).contains(&b)
    }
}
