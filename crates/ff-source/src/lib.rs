//! Keeps the data store in sync with an upstream service: a streaming (SSE)
//! client and a polling client, both driving a shared
//! initializing/valid/interrupted/off status state machine, plus a
//! big-segments store staleness poller.

mod backoff;
mod big_segment_status;
mod error;
mod payload;
mod polling;
mod status;
mod streaming;

pub use backoff::ReconnectBackoff;
pub use big_segment_status::{BigSegmentStatusPoller, BigSegmentStoreStatus};
pub use error::{classify_status, DataSourceErrorInfo, ErrorInfoKind, Recoverability, SourceError};
pub use polling::{PollingConfig, PollingSource};
pub use status::{DataSourceState, DataSourceStatus, HealthTracker, StatusTracker, StatusTrackerHandle};
pub use streaming::{StreamingConfig, StreamingSource};
