use ff_model::{AllData, DataKind, Item};

use crate::error::StoreError;

/// The data store contract. Implementations must enforce monotonic-version
/// upserts: `upsert` only takes effect when `item.version() > existing.version()`.
/// `get` returns tombstones too — callers that care about liveness check
/// `Item::is_deleted`.
pub trait DataStore: Send + Sync {
    fn init(&self, data: AllData);

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<Item>, StoreError>;

    fn all(&self, kind: DataKind) -> Result<std::collections::HashMap<String, Item>, StoreError>;

    /// Returns `Ok(true)` iff the upsert actually changed the stored item.
    fn upsert(&self, kind: DataKind, key: &str, item: Item) -> Result<bool, StoreError>;

    fn initialized(&self) -> Result<bool, StoreError>;

    /// Whether the store can currently serve fresh data. Most implementations
    /// are always available; [`crate::CachingStore`] overrides this to reflect
    /// whether its persistent layer is in an outage.
    fn is_available(&self) -> bool {
        true
    }
}
