use std::future::Future;
use std::time::{Duration, Instant};

use ff_events::{FeatureRequestEvent, MigrationOpEvent};
use ff_model::Context;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationStage {
    Off,
    DualWrite,
    Shadow,
    Live,
    Rampdown,
    Complete,
}

impl MigrationStage {
    pub fn parse(raw: &str) -> Option<MigrationStage> {
        match raw {
            "off" => Some(MigrationStage::Off),
            "dualwrite" => Some(MigrationStage::DualWrite),
            "shadow" => Some(MigrationStage::Shadow),
            "live" => Some(MigrationStage::Live),
            "rampdown" => Some(MigrationStage::Rampdown),
            "complete" => Some(MigrationStage::Complete),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Old,
    New,
}

impl Origin {
    fn label(self) -> &'static str {
        match self {
            Origin::Old => "old",
            Origin::New => "new",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadExecutionOrder {
    Serial,
    Randomized,
    Concurrent,
}

/// `(authoritative, non-authoritative)` read origins for a stage. `None`
/// means only the authoritative side is read.
fn read_origins(stage: MigrationStage) -> (Origin, Option<Origin>) {
    match stage {
        MigrationStage::Off | MigrationStage::DualWrite => (Origin::Old, None),
        MigrationStage::Shadow => (Origin::Old, Some(Origin::New)),
        MigrationStage::Live => (Origin::New, Some(Origin::Old)),
        MigrationStage::Rampdown | MigrationStage::Complete => (Origin::New, None),
    }
}

/// `(authoritative, secondary)` write origins for a stage, in invocation
/// order. A secondary write failure is reported but never escalated.
fn write_origins(stage: MigrationStage) -> (Origin, Option<Origin>) {
    match stage {
        MigrationStage::Off => (Origin::Old, None),
        MigrationStage::DualWrite | MigrationStage::Shadow => (Origin::Old, Some(Origin::New)),
        MigrationStage::Live | MigrationStage::Rampdown => (Origin::New, Some(Origin::Old)),
        MigrationStage::Complete => (Origin::New, None),
    }
}

/// Accumulates everything one migration-assisted read or write invokes:
/// which origins ran, how long each took, which errored, and (for reads
/// with a comparison callback) whether old and new agreed. Feeds a single
/// [`MigrationOpEvent`] at the end.
pub struct MigrationOpTracker {
    operation: String,
    invoked: Vec<String>,
    latencies_millis: Vec<(String, f64)>,
    errors: Vec<String>,
    consistency_check: Option<bool>,
}

impl MigrationOpTracker {
    pub fn new(operation: impl Into<String>) -> MigrationOpTracker {
        MigrationOpTracker {
            operation: operation.into(),
            invoked: Vec::new(),
            latencies_millis: Vec::new(),
            errors: Vec::new(),
            consistency_check: None,
        }
    }

    fn record(&mut self, origin: Origin, latency: Duration, ok: bool) {
        let label = origin.label().to_string();
        if !self.invoked.contains(&label) {
            self.invoked.push(label.clone());
        }
        self.latencies_millis.push((label.clone(), latency.as_secs_f64() * 1000.0));
        if !ok {
            self.errors.push(label);
        }
    }

    pub fn record_consistency(&mut self, consistent: bool) {
        self.consistency_check = Some(consistent);
    }

    pub fn into_event(
        self,
        flag_key: String,
        context: Context,
        evaluation: FeatureRequestEvent,
        creation_date: i64,
    ) -> MigrationOpEvent {
        MigrationOpEvent {
            creation_date,
            operation: self.operation,
            flag_key,
            context,
            evaluation,
            consistency_check: self.consistency_check,
            invoked: self.invoked,
            latencies_millis: self.latencies_millis,
            errors: self.errors,
        }
    }
}

/// Runs the old and/or new read callbacks for `stage` and returns the
/// authoritative result. When both sides are read, `order` picks the await
/// order (`Concurrent` joins them); when a comparison callback is given and
/// both succeed, `check_ratio` (already resolved from the flag's sampling
/// configuration) decides whether this invocation records a consistency
/// result at all. A failure of the authoritative side propagates as `Err`
/// rather than panicking; it is a runtime condition (the caller's read
/// failed), not a bug in this function.
pub async fn run_read<T, OldFut, NewFut, Cmp>(
    stage: MigrationStage,
    order: ReadExecutionOrder,
    tracker: &mut MigrationOpTracker,
    check_ratio: f64,
    old: impl FnOnce() -> OldFut,
    new: impl FnOnce() -> NewFut,
    compare: Cmp,
) -> Result<T, String>
where
    OldFut: Future<Output = Result<T, String>>,
    NewFut: Future<Output = Result<T, String>>,
    Cmp: FnOnce(&T, &T) -> bool,
{
    let (authoritative, secondary) = read_origins(stage);

    if secondary.is_none() {
        let started = Instant::now();
        let result = match authoritative {
            Origin::Old => old().await,
            Origin::New => new().await,
        };
        tracker.record(authoritative, started.elapsed(), result.is_ok());
        return result;
    }

    let old_fut = old();
    let new_fut = new();

    let (old_result, new_result) = match order {
        ReadExecutionOrder::Concurrent => {
            let started = Instant::now();
            let (o, n) = tokio::join!(old_fut, new_fut);
            let elapsed = started.elapsed();
            tracker.record(Origin::Old, elapsed, o.is_ok());
            tracker.record(Origin::New, elapsed, n.is_ok());
            (o, n)
        }
        ReadExecutionOrder::Serial => {
            let started = Instant::now();
            let o = old_fut.await;
            tracker.record(Origin::Old, started.elapsed(), o.is_ok());
            let started = Instant::now();
            let n = new_fut.await;
            tracker.record(Origin::New, started.elapsed(), n.is_ok());
            (o, n)
        }
        ReadExecutionOrder::Randomized => {
            if rand::thread_rng().gen_bool(0.5) {
                let started = Instant::now();
                let n = new_fut.await;
                tracker.record(Origin::New, started.elapsed(), n.is_ok());
                let started = Instant::now();
                let o = old_fut.await;
                tracker.record(Origin::Old, started.elapsed(), o.is_ok());
                (o, n)
            } else {
                let started = Instant::now();
                let o = old_fut.await;
                tracker.record(Origin::Old, started.elapsed(), o.is_ok());
                let started = Instant::now();
                let n = new_fut.await;
                tracker.record(Origin::New, started.elapsed(), n.is_ok());
                (o, n)
            }
        }
    };

    if let (Ok(a), Ok(b)) = (&old_result, &new_result) {
        if check_ratio > 0.0 && rand::thread_rng().gen_bool(check_ratio.min(1.0)) {
            tracker.record_consistency(compare(a, b));
        }
    }

    match authoritative {
        Origin::Old => old_result,
        Origin::New => new_result,
    }
}

/// Runs the authoritative write for `stage`; if it succeeds and a secondary
/// write is configured, runs that too. The secondary's outcome is recorded
/// on `tracker` but never changes the returned result.
pub async fn run_write<T, OldFut, NewFut>(
    stage: MigrationStage,
    tracker: &mut MigrationOpTracker,
    old: impl FnOnce() -> OldFut,
    new: impl FnOnce() -> NewFut,
) -> Result<T, String>
where
    OldFut: Future<Output = Result<T, String>>,
    NewFut: Future<Output = Result<T, String>>,
{
    let (authoritative, secondary) = write_origins(stage);

    let started = Instant::now();
    let auth_result = match authoritative {
        Origin::Old => old().await,
        Origin::New => new().await,
    };
    tracker.record(authoritative, started.elapsed(), auth_result.is_ok());
    if auth_result.is_err() {
        return auth_result;
    }

    if let Some(secondary) = secondary {
        let started = Instant::now();
        let sec_result = match secondary {
            Origin::Old => old().await,
            Origin::New => new().await,
        };
        tracker.record(secondary, started.elapsed(), sec_result.is_ok());
    }

    auth_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_table_matches_read_write_origins() {
        assert_eq!(read_origins(MigrationStage::Off), (Origin::Old, None));
        assert_eq!(read_origins(MigrationStage::Shadow), (Origin::Old, Some(Origin::New)));
        assert_eq!(read_origins(MigrationStage::Live), (Origin::New, Some(Origin::Old)));
        assert_eq!(read_origins(MigrationStage::Complete), (Origin::New, None));

        assert_eq!(write_origins(MigrationStage::Off), (Origin::Old, None));
        assert_eq!(write_origins(MigrationStage::DualWrite), (Origin::Old, Some(Origin::New)));
        assert_eq!(write_origins(MigrationStage::Rampdown), (Origin::New, Some(Origin::Old)));
        assert_eq!(write_origins(MigrationStage::Complete), (Origin::New, None));
    }

    #[test]
    fn stage_parses_from_variation_string() {
        assert_eq!(MigrationStage::parse("shadow"), Some(MigrationStage::Shadow));
        assert_eq!(MigrationStage::parse("nonsense"), None);
    }

    #[tokio::test]
    async fn authoritative_write_failure_short_circuits_secondary() {
        let mut tracker = MigrationOpTracker::new("write");
        let result: Result<(), String> = run_write(
            MigrationStage::DualWrite,
            &mut tracker,
            || async { Err("old failed".to_string()) },
            || async { panic!("secondary write must not run after authoritative failure") },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(tracker.errors, vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn dualwrite_runs_old_then_new_and_records_both() {
        let mut tracker = MigrationOpTracker::new("write");
        let result: Result<i64, String> = run_write(
            MigrationStage::DualWrite,
            &mut tracker,
            || async { Ok(1i64) },
            || async { Ok(2i64) },
        )
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(tracker.invoked, vec!["old".to_string(), "new".to_string()]);
        assert!(tracker.errors.is_empty());
    }

    #[tokio::test]
    async fn shadow_read_is_authoritative_old_with_consistency_check() {
        let mut tracker = MigrationOpTracker::new("read");
        let value = run_read(
            MigrationStage::Shadow,
            ReadExecutionOrder::Serial,
            &mut tracker,
            1.0,
            || async { Ok(1i64) },
            || async { Ok(2i64) },
            |a: &i64, b: &i64| a == b,
        )
        .await;
        assert_eq!(value, Ok(1));
        assert_eq!(tracker.consistency_check, Some(false));
    }

    #[tokio::test]
    async fn live_read_is_authoritative_new() {
        let mut tracker = MigrationOpTracker::new("read");
        let value = run_read(
            MigrationStage::Live,
            ReadExecutionOrder::Concurrent,
            &mut tracker,
            0.0,
            || async { Ok(1i64) },
            || async { Ok(2i64) },
            |a: &i64, b: &i64| a == b,
        )
        .await;
        assert_eq!(value, Ok(2));
        assert_eq!(tracker.consistency_check, None);
    }

    #[tokio::test]
    async fn authoritative_read_failure_propagates_as_err_not_panic() {
        let mut tracker = MigrationOpTracker::new("read");
        let value: Result<i64, String> = run_read(
            MigrationStage::Live,
            ReadExecutionOrder::Serial,
            &mut tracker,
            0.0,
            || async { Ok(1i64) },
            || async { Err("new side timed out".to_string()) },
            |a: &i64, b: &i64| a == b,
        )
        .await;
        assert_eq!(value, Err("new side timed out".to_string()));
    }
}
