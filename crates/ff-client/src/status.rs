use ff_source::{BigSegmentStoreStatus, DataSourceStatus, StatusTrackerHandle};
use ff_store::ChangeNotification;
use tokio::sync::{broadcast, watch};

/// Read-only view onto the data source's `initializing`/`valid`/
/// `interrupted`/`off` state machine.
#[derive(Clone)]
pub struct DataSourceStatusProvider {
    handle: StatusTrackerHandle,
}

impl DataSourceStatusProvider {
    pub fn new(handle: StatusTrackerHandle) -> DataSourceStatusProvider {
        DataSourceStatusProvider { handle }
    }

    pub fn current(&self) -> DataSourceStatus {
        self.handle.current()
    }

    pub fn listen(&self) -> watch::Receiver<DataSourceStatus> {
        self.handle.subscribe()
    }
}

/// Fires once per flag or segment key whose stored item actually changed
/// (full `init` snapshots fire once per key too). Callers interested in a
/// single flag filter the stream themselves by key.
#[derive(Clone)]
pub struct FlagChangeNotifier {
    rx: broadcast::Receiver<ChangeNotification>,
}

impl FlagChangeNotifier {
    pub fn new(rx: broadcast::Receiver<ChangeNotification>) -> FlagChangeNotifier {
        FlagChangeNotifier { rx }
    }

    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Read-only view onto the big-segments store staleness poller. Absent
/// entirely when big segments aren't configured.
#[derive(Clone)]
pub struct BigSegmentStoreStatusProvider {
    rx: watch::Receiver<BigSegmentStoreStatus>,
}

impl BigSegmentStoreStatusProvider {
    pub fn new(rx: watch::Receiver<BigSegmentStoreStatus>) -> BigSegmentStoreStatusProvider {
        BigSegmentStoreStatusProvider { rx }
    }

    pub fn current(&self) -> BigSegmentStoreStatus {
        *self.rx.borrow()
    }

    pub fn listen(&self) -> watch::Receiver<BigSegmentStoreStatus> {
        self.rx.clone()
    }
}

/// Whether the data store itself is reachable, distinct from whether the
/// data source has a healthy upstream connection: an infinite-cache
/// `CachingStore` can serve stale data from a dead persistent store, so this
/// tracks the persistent layer specifically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataStoreStatus {
    Available,
    Unavailable,
}
