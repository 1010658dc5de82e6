use std::sync::Arc;

use ff_model::{DataKind, Flag, Segment};
use ff_store::DataStore;

use crate::evaluator::FlagSource;
use crate::segment_eval::SegmentSource;

/// Adapts any [`DataStore`] into the [`FlagSource`]/[`SegmentSource`] the
/// evaluator needs, treating a store error or a tombstone the same as "not
/// found" — evaluation degrades to `FLAG_NOT_FOUND`/no-match rather than
/// failing outright.
pub struct StoreAdapter<S: DataStore> {
    store: Arc<S>,
}

impl<S: DataStore> StoreAdapter<S> {
    pub fn new(store: Arc<S>) -> StoreAdapter<S> {
        StoreAdapter { store }
    }
}

impl<S: DataStore> FlagSource for StoreAdapter<S> {
    fn flag(&self, key: &str) -> Option<Flag> {
        match self.store.get(DataKind::Flag, key) {
            Ok(Some(item)) => item.as_flag().filter(|f| !f.deleted).cloned(),
            _ => None,
        }
    }
}

impl<S: DataStore> SegmentSource for StoreAdapter<S> {
    fn segment(&self, key: &str) -> Option<Segment> {
        match self.store.get(DataKind::Segment, key) {
            Ok(Some(item)) => item.as_segment().filter(|s| !s.deleted).cloned(),
            _ => None,
        }
    }
}
