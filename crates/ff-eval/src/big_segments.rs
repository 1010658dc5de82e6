use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum BigSegmentError {
    #[error("big segment store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug)]
pub struct BigSegmentMetadata {
    pub last_up_to_date_millis: Option<i64>,
}

/// The external big-segments store contract: membership for a hashed context
/// is looked up by `segmentRef = "{segment_key}:{generation}"`, with explicit
/// include (`true`), explicit exclude (`false`), and unknown (absent) all
/// distinguished.
pub trait BigSegmentStore: Send + Sync {
    fn get_metadata(&self) -> Result<BigSegmentMetadata, BigSegmentError>;

    fn get_membership(&self, context_hash: &str) -> Result<HashMap<String, bool>, BigSegmentError>;
}

/// Hashes a context the way membership lookups key by it, reusing the same
/// SHA-1 primitive the rollout bucketing uses rather than a second hash
/// function.
pub fn context_hash(kind: &str, key: &str) -> String {
    use sha1::{Digest, Sha1};
    let digest = Sha1::digest(format!("{kind}:{key}").as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
