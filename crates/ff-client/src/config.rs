use std::time::Duration;

const DEFAULT_STREAMING_BASE_URL: &str = "https://stream.flagcore.dev";
const DEFAULT_POLLING_BASE_URL: &str = "https://sdk.flagcore.dev";
const DEFAULT_EVENTS_BASE_URL: &str = "https://events.flagcore.dev";

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_APPLICATION_INFO_LEN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSourceMode {
    Streaming,
    Polling,
}

#[derive(Clone, Debug)]
pub struct StreamingOptions {
    pub base_url: String,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        StreamingOptions {
            base_url: DEFAULT_STREAMING_BASE_URL.to_string(),
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PollingOptions {
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Default for PollingOptions {
    fn default() -> Self {
        PollingOptions {
            base_url: DEFAULT_POLLING_BASE_URL.to_string(),
            poll_interval: MIN_POLL_INTERVAL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventsOptions {
    pub base_url: String,
    pub capacity: usize,
    pub flush_interval: Duration,
    pub all_attributes_private: bool,
    pub private_attribute_names: Vec<String>,
    pub user_keys_capacity: usize,
    pub user_keys_flush_interval: Duration,
    pub diagnostic_opt_out: bool,
    pub diagnostic_recording_interval: Duration,
}

impl Default for EventsOptions {
    fn default() -> Self {
        EventsOptions {
            base_url: DEFAULT_EVENTS_BASE_URL.to_string(),
            capacity: 10_000,
            flush_interval: Duration::from_secs(5),
            all_attributes_private: false,
            private_attribute_names: Vec::new(),
            user_keys_capacity: 1_000,
            user_keys_flush_interval: Duration::from_secs(5 * 60),
            diagnostic_opt_out: false,
            diagnostic_recording_interval: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BigSegmentsOptions {
    pub stale_after: Duration,
    pub status_poll_interval: Duration,
    pub user_cache_size: usize,
    pub user_cache_time: Duration,
}

impl Default for BigSegmentsOptions {
    fn default() -> Self {
        BigSegmentsOptions {
            stale_after: Duration::from_secs(2 * 60),
            status_poll_interval: Duration::from_secs(5),
            user_cache_size: 1_000,
            user_cache_time: Duration::from_secs(5),
        }
    }
}

/// `applicationInfo.{id,version}`: free-text tags echoed back to the
/// upstream service for usage attribution. Each field is dropped (with a
/// warning) rather than rejected if it exceeds the length upstream accepts,
/// so a misconfigured tag never prevents the client from starting.
#[derive(Clone, Debug, Default)]
pub struct ApplicationInfo {
    pub id: Option<String>,
    pub version: Option<String>,
}

impl ApplicationInfo {
    fn validate(mut self) -> ApplicationInfo {
        if let Some(id) = &self.id {
            if id.len() > MAX_APPLICATION_INFO_LEN {
                tracing::warn!(len = id.len(), "applicationInfo.id exceeds 64 characters, dropping");
                self.id = None;
            }
        }
        if let Some(version) = &self.version {
            if version.len() > MAX_APPLICATION_INFO_LEN {
                tracing::warn!(len = version.len(), "applicationInfo.version exceeds 64 characters, dropping");
                self.version = None;
            }
        }
        self
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub sdk_key: String,
    pub offline: bool,
    pub external_updates_only: bool,
    pub data_source_mode: DataSourceMode,
    pub streaming: StreamingOptions,
    pub polling: PollingOptions,
    pub events: EventsOptions,
    pub big_segments: BigSegmentsOptions,
    pub application_info: ApplicationInfo,
    pub start_wait_timeout: Duration,
}

pub struct ConfigBuilder {
    sdk_key: String,
    offline: bool,
    external_updates_only: bool,
    data_source_mode: DataSourceMode,
    streaming: StreamingOptions,
    polling: PollingOptions,
    events: EventsOptions,
    big_segments: BigSegmentsOptions,
    application_info: ApplicationInfo,
    start_wait_timeout: Duration,
}

impl ConfigBuilder {
    pub fn new(sdk_key: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            sdk_key: sdk_key.into(),
            offline: false,
            external_updates_only: false,
            data_source_mode: DataSourceMode::Streaming,
            streaming: StreamingOptions::default(),
            polling: PollingOptions::default(),
            events: EventsOptions::default(),
            big_segments: BigSegmentsOptions::default(),
            application_info: ApplicationInfo::default(),
            start_wait_timeout: Duration::from_secs(5),
        }
    }

    pub fn offline(mut self, offline: bool) -> ConfigBuilder {
        self.offline = offline;
        self
    }

    pub fn external_updates_only(mut self, external_updates_only: bool) -> ConfigBuilder {
        self.external_updates_only = external_updates_only;
        self
    }

    pub fn streaming(mut self, options: StreamingOptions) -> ConfigBuilder {
        self.data_source_mode = DataSourceMode::Streaming;
        self.streaming = options;
        self
    }

    /// Polling intervals below 30s are clamped up: the upstream service
    /// rate-limits more aggressive polling anyway.
    pub fn polling(mut self, mut options: PollingOptions) -> ConfigBuilder {
        if options.poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(requested = ?options.poll_interval, "poll interval below 30s minimum, clamping");
            options.poll_interval = MIN_POLL_INTERVAL;
        }
        self.data_source_mode = DataSourceMode::Polling;
        self.polling = options;
        self
    }

    pub fn events(mut self, options: EventsOptions) -> ConfigBuilder {
        self.events = options;
        self
    }

    pub fn big_segments(mut self, options: BigSegmentsOptions) -> ConfigBuilder {
        self.big_segments = options;
        self
    }

    pub fn application_info(mut self, info: ApplicationInfo) -> ConfigBuilder {
        self.application_info = info;
        self
    }

    pub fn start_wait_timeout(mut self, timeout: Duration) -> ConfigBuilder {
        self.start_wait_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        Config {
            sdk_key: self.sdk_key,
            offline: self.offline,
            external_updates_only: self.external_updates_only,
            data_source_mode: self.data_source_mode,
            streaming: self.streaming,
            polling: self.polling,
            events: self.events,
            big_segments: self.big_segments,
            application_info: self.application_info.validate(),
            start_wait_timeout: self.start_wait_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_below_minimum_is_clamped() {
        let config = ConfigBuilder::new("key").polling(PollingOptions {
            base_url: DEFAULT_POLLING_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
        });
        assert_eq!(config.polling.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn oversized_application_info_is_dropped_not_rejected() {
        let config = ConfigBuilder::new("key")
            .application_info(ApplicationInfo {
                id: Some("x".repeat(65)),
                version: Some("1.0".to_string()),
            })
            .build();
        assert_eq!(config.application_info.id, None);
        assert_eq!(config.application_info.version, Some("1.0".to_string()));
    }

    #[test]
    fn defaults_select_streaming() {
        let config = ConfigBuilder::new("key").build();
        assert_eq!(config.data_source_mode, DataSourceMode::Streaming);
        assert!(!config.offline);
    }
}
