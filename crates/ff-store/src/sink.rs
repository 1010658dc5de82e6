use std::sync::Arc;

use ff_model::{AllData, DataKind, Item};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::traits::DataStore;

#[derive(Clone, Debug)]
pub struct ChangeNotification {
    pub kind: DataKind,
    pub key: String,
}

/// The data source's only way to reach the store. Wraps any [`DataStore`]
/// and broadcasts one [`ChangeNotification`] per upsert that actually
/// changed something, plus one per key in a full `init`.
pub struct UpdateSink<S: DataStore> {
    store: Arc<S>,
    changes: broadcast::Sender<ChangeNotification>,
}

impl<S: DataStore> UpdateSink<S> {
    pub fn new(store: Arc<S>) -> UpdateSink<S> {
        let (changes, _) = broadcast::channel(1024);
        UpdateSink { store, changes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.changes.subscribe()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn init(&self, data: AllData) {
        let keys: Vec<(DataKind, String)> = data
            .flags
            .keys()
            .map(|k| (DataKind::Flag, k.clone()))
            .chain(data.segments.keys().map(|k| (DataKind::Segment, k.clone())))
            .collect();
        self.store.init(data);
        for (kind, key) in keys {
            let _ = self.changes.send(ChangeNotification { kind, key });
        }
    }

    pub fn upsert(&self, kind: DataKind, key: &str, item: Item) -> Result<bool, StoreError> {
        let updated = self.store.upsert(kind, key, item)?;
        if updated {
            let _ = self.changes.send(ChangeNotification {
                kind,
                key: key.to_string(),
            });
        }
        Ok(updated)
    }
}
