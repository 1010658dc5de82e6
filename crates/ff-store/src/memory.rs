use std::collections::HashMap;
use std::sync::RwLock;

use ff_model::{AllData, DataKind, Item};

use crate::error::StoreError;
use crate::traits::DataStore;

#[derive(Default)]
struct Inner {
    flags: HashMap<String, Item>,
    segments: HashMap<String, Item>,
    initialized: bool,
}

impl Inner {
    fn map(&self, kind: DataKind) -> &HashMap<String, Item> {
        match kind {
            DataKind::Flag => &self.flags,
            DataKind::Segment => &self.segments,
        }
    }

    fn map_mut(&mut self, kind: DataKind) -> &mut HashMap<String, Item> {
        match kind {
            DataKind::Flag => &mut self.flags,
            DataKind::Segment => &mut self.segments,
        }
    }
}

/// The default data store: a single reader/writer lock over per-kind maps.
/// Evaluations are fast and writes are rare, so one coarse lock is
/// sufficient; there's no need for per-key locking.
pub struct InMemoryDataStore {
    inner: RwLock<Inner>,
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        InMemoryDataStore {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl InMemoryDataStore {
    pub fn new() -> InMemoryDataStore {
        InMemoryDataStore::default()
    }
}

impl DataStore for InMemoryDataStore {
    fn init(&self, data: AllData) {
        let mut inner = self.inner.write().expect("data store lock poisoned");
        inner.flags = data
            .flags
            .into_iter()
            .map(|(k, v)| (k, Item::Flag(v)))
            .collect();
        inner.segments = data
            .segments
            .into_iter()
            .map(|(k, v)| (k, Item::Segment(v)))
            .collect();
        inner.initialized = true;
    }

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<Item>, StoreError> {
        let inner = self.inner.read().expect("data store lock poisoned");
        Ok(inner.map(kind).get(key).cloned())
    }

    fn all(&self, kind: DataKind) -> Result<HashMap<String, Item>, StoreError> {
        let inner = self.inner.read().expect("data store lock poisoned");
        Ok(inner
            .map(kind)
            .iter()
            .filter(|(_, item)| !item.is_deleted())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn upsert(&self, kind: DataKind, key: &str, item: Item) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().expect("data store lock poisoned");
        let map = inner.map_mut(kind);
        let updated = match map.get(key) {
            Some(existing) if existing.version() >= item.version() => false,
            _ => {
                map.insert(key.to_string(), item);
                true
            }
        };
        Ok(updated)
    }

    fn initialized(&self) -> Result<bool, StoreError> {
        Ok(self.inner.read().expect("data store lock poisoned").initialized)
    }
}
