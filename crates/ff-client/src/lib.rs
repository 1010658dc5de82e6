//! The client façade: configuration, the typed evaluation API, hooks,
//! status providers, and the migration-assist helper, built on top of
//! [`ff_store`], [`ff_eval`], [`ff_source`] and [`ff_events`].

mod client;
mod config;
mod hooks;
mod migration;
mod status;

pub use client::{AllFlagsState, AllFlagsStateOptions, Client, EventsDisabledView, FlagState, VariationDetail};
pub use config::{ApplicationInfo, BigSegmentsOptions, Config, ConfigBuilder, DataSourceMode, EventsOptions, PollingOptions, StreamingOptions};
pub use hooks::{EvaluationSeriesContext, Hook, HookMetadata, HookRegistry, SeriesData};
pub use migration::{run_read, run_write, MigrationOpTracker, MigrationStage, Origin, ReadExecutionOrder};
pub use status::{BigSegmentStoreStatusProvider, DataSourceStatusProvider, DataStoreStatus, FlagChangeNotifier};
