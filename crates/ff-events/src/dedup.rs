use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Tracks which context keys have already produced an `identify`-equivalent
/// event recently, so a busy flag evaluation loop doesn't emit one per call.
/// Bounded FIFO eviction (`userKeysCapacity`) plus a full periodic reset
/// (`userKeysFlushInterval`) stand in for a proper LRU.
pub struct ContextKeyCache {
    capacity: usize,
    flush_interval: Duration,
    last_flush: Instant,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl ContextKeyCache {
    pub fn new(capacity: usize, flush_interval: Duration) -> ContextKeyCache {
        ContextKeyCache {
            capacity,
            flush_interval,
            last_flush: Instant::now(),
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns `true` if this is the first time `key` has been noted since
    /// the last reset (i.e. an identify-equivalent event should be emitted).
    pub fn note(&mut self, key: &str, now: Instant) -> bool {
        if now.duration_since(self.last_flush) >= self.flush_interval {
            self.seen.clear();
            self.order.clear();
            self.last_flush = now;
        }

        if self.seen.contains(key) {
            return false;
        }

        if self.seen.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.seen.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }
}
