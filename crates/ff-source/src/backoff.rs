use std::time::Duration;

use exponential_backoff::Backoff;
use rand::Rng;

/// Reconnect backoff for the streaming source: doubles from an initial delay
/// up to a cap, with up to 50% negative jitter, and resets once the stream
/// has been healthy for [`crate::status::HEALTHY_RESET_THRESHOLD`].
#[derive(Debug)]
pub struct ReconnectBackoff {
    backoff: Backoff,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> ReconnectBackoff {
        ReconnectBackoff {
            backoff: Backoff::new(u32::MAX, initial, Some(max)),
            attempt: 0,
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// The un-jittered doubling delay for the next attempt, with up to 50%
    /// shaved off uniformly at random: "uniform in [delay/2, delay]", the
    /// most common jitter formulation across LaunchDarkly server SDKs.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        let base = self.backoff.next(self.attempt).unwrap_or(Duration::from_secs(30));
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        base.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_the_unjittered_cap() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_secs(30));
        }
    }

    #[test]
    fn reset_restarts_the_doubling_sequence() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(100), Duration::from_secs(30));
        for _ in 0..10 {
            backoff.next_delay();
        }
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis(100));
    }
}
