use std::collections::HashMap;

use ff_model::DataKind;

use crate::error::StoreError;

/// A single serialized item plus its version, as a persistent store would
/// return it. The core owns serialization: `ff-client` is expected to
/// serialize `Item`s to/from this with `serde_json` before calling through
/// a [`PersistentStore`] implementation.
#[derive(Clone, Debug)]
pub struct SerializedItem {
    pub version: u64,
    pub deleted: bool,
    pub data: String,
}

/// The contract a pluggable persistent store (Redis, DynamoDB, Consul, ...)
/// implements. Concrete drivers live outside this crate — only this
/// interface is defined here, and [`crate::cache::CachingStore`] adapts it
/// into a [`crate::DataStore`].
pub trait PersistentStore: Send + Sync {
    fn init(&self, data: HashMap<DataKind, HashMap<String, SerializedItem>>) -> Result<(), StoreError>;

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<SerializedItem>, StoreError>;

    fn get_all(&self, kind: DataKind) -> Result<HashMap<String, SerializedItem>, StoreError>;

    /// Returns `Ok(true)` iff the write took effect (version was newer).
    fn upsert(&self, kind: DataKind, key: &str, item: SerializedItem) -> Result<bool, StoreError>;

    fn initialized(&self) -> Result<bool, StoreError>;
}
