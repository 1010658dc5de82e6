use std::sync::Arc;
use std::time::Duration;

use ff_eval::BigSegmentStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BigSegmentStoreStatus {
    pub available: bool,
    pub stale: bool,
}

pub struct BigSegmentStatusPoller {
    pub handle: JoinHandle<()>,
    rx: watch::Receiver<BigSegmentStoreStatus>,
}

impl BigSegmentStatusPoller {
    pub fn start<B: BigSegmentStore + 'static>(
        store: Arc<B>,
        poll_interval: Duration,
        stale_after: Duration,
    ) -> BigSegmentStatusPoller {
        let (tx, rx) = watch::channel(BigSegmentStoreStatus {
            available: false,
            stale: false,
        });
        let handle = tokio::spawn(run(store, poll_interval, stale_after, tx));
        BigSegmentStatusPoller { handle, rx }
    }

    pub fn current(&self) -> BigSegmentStoreStatus {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BigSegmentStoreStatus> {
        self.rx.clone()
    }
}

async fn run<B: BigSegmentStore>(
    store: Arc<B>,
    poll_interval: Duration,
    stale_after: Duration,
    tx: watch::Sender<BigSegmentStoreStatus>,
) {
    loop {
        let status = match store.get_metadata() {
            Ok(meta) => {
                let stale = meta
                    .last_up_to_date_millis
                    .map(|last| now_millis() - last > stale_after.as_millis() as i64)
                    .unwrap_or(true);
                BigSegmentStoreStatus { available: true, stale }
            }
            Err(_) => BigSegmentStoreStatus {
                available: false,
                stale: true,
            },
        };
        let _ = tx.send(status);
        tokio::time::sleep(poll_interval).await;
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
