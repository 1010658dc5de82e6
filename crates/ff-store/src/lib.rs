//! The data store layer: an in-memory [`DataStore`], a [`CachingStore`]
//! wrapper for pluggable [`PersistentStore`]s, and the [`UpdateSink`] the
//! data source writes through.

mod cache;
mod error;
mod memory;
mod persistent;
mod sink;
mod traits;

pub use cache::{CacheMode, CachingStore};
pub use error::StoreError;
pub use memory::InMemoryDataStore;
pub use persistent::{PersistentStore, SerializedItem};
pub use sink::{ChangeNotification, UpdateSink};
pub use traits::DataStore;
