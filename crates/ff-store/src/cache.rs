use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ff_model::{AllData, DataKind, Flag, Item, Segment};

use crate::error::StoreError;
use crate::persistent::{PersistentStore, SerializedItem};
use crate::traits::DataStore;

#[derive(Clone, Copy, Debug)]
pub enum CacheMode {
    Disabled,
    Ttl(Duration),
    Infinite,
}

fn item_to_serialized(item: &Item) -> Result<SerializedItem, StoreError> {
    let data = match item {
        Item::Flag(f) => serde_json::to_string(f),
        Item::Segment(s) => serde_json::to_string(s),
    }
    .map_err(|e| StoreError::Serialize(e.to_string()))?;
    Ok(SerializedItem {
        version: item.version(),
        deleted: item.is_deleted(),
        data,
    })
}

fn serialized_to_item(kind: DataKind, serialized: &SerializedItem) -> Result<Item, StoreError> {
    match kind {
        DataKind::Flag => {
            if serialized.deleted {
                return Ok(Item::Flag(Flag::tombstone("", serialized.version)));
            }
            serde_json::from_str::<Flag>(&serialized.data)
                .map(Item::Flag)
                .map_err(|e| StoreError::Deserialize(e.to_string()))
        }
        DataKind::Segment => {
            if serialized.deleted {
                return Ok(Item::Segment(Segment::tombstone("", serialized.version)));
            }
            serde_json::from_str::<Segment>(&serialized.data)
                .map(Item::Segment)
                .map_err(|e| StoreError::Deserialize(e.to_string()))
        }
    }
}

struct CacheEntry {
    item: Option<Item>,
    stored_at: Instant,
}

type LoadLock = Arc<Mutex<()>>;

/// Adapts a [`PersistentStore`] into a [`DataStore`], adding TTL or infinite
/// caching, single-flight loads on cache miss, and (in infinite mode) a
/// write-through outage monitor so a transient backend failure never loses
/// state.
pub struct CachingStore<P: PersistentStore> {
    persistent: Arc<P>,
    mode: CacheMode,
    items: Mutex<HashMap<(DataKind, String), CacheEntry>>,
    all_cache: Mutex<HashMap<DataKind, (HashMap<String, Item>, Instant)>>,
    load_locks: Mutex<HashMap<(DataKind, String), LoadLock>>,
    initialized: std::sync::atomic::AtomicBool,
    outage: Arc<std::sync::atomic::AtomicBool>,
    /// Every write that failed during the current outage, keyed so a second
    /// (or third, ...) failing key during the same outage is replayed on
    /// recovery instead of only the first one that triggered the retry task.
    pending_writes: Arc<Mutex<HashMap<(DataKind, String), SerializedItem>>>,
}

impl<P: PersistentStore + 'static> CachingStore<P> {
    pub fn new(persistent: P, mode: CacheMode) -> Arc<CachingStore<P>> {
        Arc::new(CachingStore {
            persistent: Arc::new(persistent),
            mode,
            items: Mutex::new(HashMap::new()),
            all_cache: Mutex::new(HashMap::new()),
            load_locks: Mutex::new(HashMap::new()),
            initialized: std::sync::atomic::AtomicBool::new(false),
            outage: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            pending_writes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn is_fresh(&self, stored_at: Instant) -> bool {
        match self.mode {
            CacheMode::Disabled => false,
            CacheMode::Infinite => true,
            CacheMode::Ttl(ttl) => stored_at.elapsed() < ttl,
        }
    }

    fn cached_item(&self, kind: DataKind, key: &str) -> Option<Option<Item>> {
        let items = self.items.lock().unwrap();
        let entry = items.get(&(kind, key.to_string()))?;
        self.is_fresh(entry.stored_at).then(|| entry.item.clone())
    }

    fn store_item_cache(&self, kind: DataKind, key: &str, item: Option<Item>) {
        if matches!(self.mode, CacheMode::Disabled) {
            return;
        }
        self.items.lock().unwrap().insert(
            (kind, key.to_string()),
            CacheEntry {
                item,
                stored_at: Instant::now(),
            },
        );
    }

    fn invalidate_all_cache(&self, kind: DataKind) {
        self.all_cache.lock().unwrap().remove(&kind);
    }

    fn load_lock(&self, kind: DataKind, key: &str) -> LoadLock {
        self.load_locks
            .lock()
            .unwrap()
            .entry((kind, key.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Queues a failed write for replay and, if an outage isn't already
    /// being retried, starts the retry task. Reconstructing the store from
    /// cached data on recovery means replaying every key that failed during
    /// the outage, not just the one that happened to trigger the retry.
    fn queue_outage_retry(self: &Arc<Self>, kind: DataKind, key: String, item: SerializedItem) {
        let mut pending = self.pending_writes.lock().unwrap();
        pending.insert((kind, key), item);
        if self.outage.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return; // a retry task is already draining `pending_writes`.
        }
        drop(pending);
        self.spawn_outage_retry();
    }

    /// Best-effort retry, not a durable queue: if the process exits
    /// mid-outage the retry is lost along with any process restart's
    /// in-memory cache.
    fn spawn_outage_retry(self: &Arc<Self>) {
        let persistent = self.persistent.clone();
        let outage = self.outage.clone();
        let pending = self.pending_writes.clone();
        tokio::spawn(async move {
            let mut delay = Duration::from_millis(500);
            loop {
                tokio::time::sleep(delay).await;
                let snapshot: Vec<((DataKind, String), SerializedItem)> = {
                    let guard = pending.lock().unwrap();
                    guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                };
                for ((kind, key), item) in &snapshot {
                    match persistent.upsert(*kind, key, item.clone()) {
                        Ok(_) => {
                            pending.lock().unwrap().remove(&(*kind, key.clone()));
                            tracing::info!(kind = kind.as_str(), key, "persistent store recovered");
                        }
                        Err(err) => {
                            tracing::warn!(kind = kind.as_str(), key, %err, "persistent store still unavailable");
                        }
                    }
                }
                // Holding the lock across this check and the outage flag
                // flip keeps a concurrently-failing write from queuing a
                // key the instant after we decide to stop retrying.
                let guard = pending.lock().unwrap();
                if guard.is_empty() {
                    outage.store(false, std::sync::atomic::Ordering::SeqCst);
                    return;
                }
                drop(guard);
                delay = (delay * 2).min(Duration::from_secs(30));
            }
        });
    }
}

impl<P: PersistentStore + 'static> DataStore for CachingStore<P> {
    fn init(&self, data: AllData) {
        let mut serialized = HashMap::new();
        let mut flags = HashMap::new();
        for (k, v) in &data.flags {
            flags.insert(k.clone(), item_to_serialized(&Item::Flag(v.clone())).expect("flag serializes"));
        }
        let mut segments = HashMap::new();
        for (k, v) in &data.segments {
            segments.insert(
                k.clone(),
                item_to_serialized(&Item::Segment(v.clone())).expect("segment serializes"),
            );
        }
        serialized.insert(DataKind::Flag, flags);
        serialized.insert(DataKind::Segment, segments);

        if let Err(err) = self.persistent.init(serialized) {
            tracing::error!(%err, "persistent store init failed; serving from cache only");
        }

        self.items.lock().unwrap().clear();
        self.all_cache.lock().unwrap().clear();
        {
            let mut all_cache = self.all_cache.lock().unwrap();
            all_cache.insert(
                DataKind::Flag,
                (
                    data.flags.into_iter().map(|(k, v)| (k, Item::Flag(v))).collect(),
                    Instant::now(),
                ),
            );
            all_cache.insert(
                DataKind::Segment,
                (
                    data.segments
                        .into_iter()
                        .map(|(k, v)| (k, Item::Segment(v)))
                        .collect(),
                    Instant::now(),
                ),
            );
        }
        self.initialized.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<Item>, StoreError> {
        if let Some(cached) = self.cached_item(kind, key) {
            return Ok(cached);
        }
        let lock = self.load_lock(kind, key);
        let _guard = lock.lock().unwrap();
        if let Some(cached) = self.cached_item(kind, key) {
            return Ok(cached);
        }
        let loaded = self.persistent.get(kind, key)?;
        let item = loaded.as_ref().map(|s| serialized_to_item(kind, s)).transpose()?;
        self.store_item_cache(kind, key, item.clone());
        Ok(item)
    }

    fn all(&self, kind: DataKind) -> Result<HashMap<String, Item>, StoreError> {
        {
            let all_cache = self.all_cache.lock().unwrap();
            if let Some((items, stored_at)) = all_cache.get(&kind) {
                if self.is_fresh(*stored_at) {
                    return Ok(items.iter().filter(|(_, i)| !i.is_deleted()).map(|(k, v)| (k.clone(), v.clone())).collect());
                }
            }
        }
        let serialized = self.persistent.get_all(kind)?;
        let mut items = HashMap::with_capacity(serialized.len());
        for (k, s) in &serialized {
            items.insert(k.clone(), serialized_to_item(kind, s)?);
        }
        self.all_cache
            .lock()
            .unwrap()
            .insert(kind, (items.clone(), Instant::now()));
        Ok(items.into_iter().filter(|(_, i)| !i.is_deleted()).collect())
    }

    fn upsert(&self, kind: DataKind, key: &str, item: Item) -> Result<bool, StoreError> {
        let serialized = item_to_serialized(&item)?;
        let result = self.persistent.upsert(kind, key, serialized.clone());

        match result {
            Ok(updated) => {
                if updated {
                    self.store_item_cache(kind, key, Some(item));
                    self.invalidate_all_cache(kind);
                }
                Ok(updated)
            }
            Err(err) => {
                if matches!(self.mode, CacheMode::Infinite) {
                    self.store_item_cache(kind, key, Some(item));
                    self.invalidate_all_cache(kind);
                    self.queue_outage_retry(kind, key.to_string(), serialized);
                    Ok(true)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn initialized(&self) -> Result<bool, StoreError> {
        if self.initialized.load(std::sync::atomic::Ordering::SeqCst) {
            return Ok(true);
        }
        self.persistent.initialized()
    }

    fn is_available(&self) -> bool {
        !self.outage.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FlakyStore {
        data: Mutex<HashMap<DataKind, HashMap<String, SerializedItem>>>,
        fail_next_upsert: std::sync::atomic::AtomicBool,
        fail_all_upserts: std::sync::atomic::AtomicBool,
        get_calls: AtomicUsize,
    }

    impl PersistentStore for FlakyStore {
        fn init(&self, data: HashMap<DataKind, HashMap<String, SerializedItem>>) -> Result<(), StoreError> {
            *self.data.lock().unwrap() = data;
            Ok(())
        }

        fn get(&self, kind: DataKind, key: &str) -> Result<Option<SerializedItem>, StoreError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.data.lock().unwrap().get(&kind).and_then(|m| m.get(key)).cloned())
        }

        fn get_all(&self, kind: DataKind) -> Result<HashMap<String, SerializedItem>, StoreError> {
            Ok(self.data.lock().unwrap().get(&kind).cloned().unwrap_or_default())
        }

        fn upsert(&self, kind: DataKind, key: &str, item: SerializedItem) -> Result<bool, StoreError> {
            if self.fail_next_upsert.swap(false, Ordering::SeqCst) || self.fail_all_upserts.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("boom".to_string()));
            }
            let mut data = self.data.lock().unwrap();
            let map = data.entry(kind).or_default();
            let updated = match map.get(key) {
                Some(existing) if existing.version >= item.version => false,
                _ => {
                    map.insert(key.to_string(), item);
                    true
                }
            };
            Ok(updated)
        }

        fn initialized(&self) -> Result<bool, StoreError> {
            Ok(!self.data.lock().unwrap().is_empty())
        }
    }

    fn flag_item(key: &str, version: u64) -> Item {
        Item::Flag(Flag::tombstone(key, version))
    }

    #[tokio::test]
    async fn cache_miss_loads_and_then_serves_from_cache() {
        let store = CachingStore::new(FlakyStore::default(), CacheMode::Ttl(Duration::from_secs(60)));
        store.upsert(DataKind::Flag, "f", flag_item("f", 1)).unwrap();
        // First get after upsert should hit the item cache populated by upsert.
        assert_eq!(store.get(DataKind::Flag, "f").unwrap().unwrap().version(), 1);
    }

    #[tokio::test]
    async fn infinite_cache_survives_transient_write_failure() {
        let persistent = FlakyStore::default();
        persistent.fail_next_upsert.store(true, Ordering::SeqCst);
        let store = CachingStore::new(persistent, CacheMode::Infinite);

        // Write fails underneath but the cache still reflects it.
        let updated = store.upsert(DataKind::Flag, "f", flag_item("f", 1)).unwrap();
        assert!(updated);
        assert_eq!(store.get(DataKind::Flag, "f").unwrap().unwrap().version(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn outage_replays_every_key_that_failed_not_just_the_first() {
        let persistent = FlakyStore::default();
        persistent.fail_all_upserts.store(true, Ordering::SeqCst);
        let store = CachingStore::new(persistent, CacheMode::Infinite);

        assert!(store.upsert(DataKind::Flag, "f1", flag_item("f1", 1)).unwrap());
        assert!(store.upsert(DataKind::Flag, "f2", flag_item("f2", 1)).unwrap());
        assert!(store.outage.load(Ordering::SeqCst));

        store.persistent.fail_all_upserts.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        let all = store.persistent.get_all(DataKind::Flag).unwrap();
        assert_eq!(all.get("f1").map(|i| i.version), Some(1));
        assert_eq!(all.get("f2").map(|i| i.version), Some(1));
        assert!(!store.outage.load(Ordering::SeqCst));
        assert!(store.is_available());
    }

    #[tokio::test]
    async fn is_available_reflects_outage_state() {
        let persistent = FlakyStore::default();
        persistent.fail_next_upsert.store(true, Ordering::SeqCst);
        let store = CachingStore::new(persistent, CacheMode::Infinite);
        assert!(store.is_available());

        store.upsert(DataKind::Flag, "f", flag_item("f", 1)).unwrap();
        assert!(!store.is_available());
    }
}
