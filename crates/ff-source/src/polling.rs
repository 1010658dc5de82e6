use std::sync::Arc;
use std::time::Duration;

use ff_store::{DataStore, UpdateSink};
use tokio::task::JoinHandle;

use crate::error::DataSourceErrorInfo;
use crate::payload::PutData;
use crate::status::{StatusTracker, StatusTrackerHandle};

pub struct PollingConfig {
    pub polling_base_url: String,
    pub sdk_key: String,
    pub poll_interval: Duration,
}

pub struct PollingSource {
    pub handle: JoinHandle<()>,
    pub status: StatusTrackerHandle,
    pub ready: tokio::sync::oneshot::Receiver<bool>,
}

impl PollingSource {
    pub fn start<S: DataStore + 'static>(config: PollingConfig, sink: Arc<UpdateSink<S>>) -> PollingSource {
        let (tracker, handle, ready) = StatusTracker::new(now_millis());
        let join = tokio::spawn(run(config, sink, tracker));
        PollingSource {
            handle: join,
            status: handle,
            ready,
        }
    }
}

async fn run<S: DataStore>(config: PollingConfig, sink: Arc<UpdateSink<S>>, mut tracker: StatusTracker) {
    let http = reqwest::Client::new();
    let url = format!("{}/sdk/latest-all", config.polling_base_url.trim_end_matches('/'));

    loop {
        match poll_once(&http, &url, &config.sdk_key, &sink).await {
            Ok(()) => tracker.on_success(now_millis()),
            Err(info) => {
                let unrecoverable = info.recoverability() == crate::error::Recoverability::Unrecoverable;
                tracker.on_error(info, now_millis());
                if unrecoverable {
                    tracing::error!("polling source received an unrecoverable error, stopping");
                    return;
                }
            }
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}

async fn poll_once<S: DataStore>(
    http: &reqwest::Client,
    url: &str,
    sdk_key: &str,
    sink: &Arc<UpdateSink<S>>,
) -> Result<(), DataSourceErrorInfo> {
    let response = http
        .get(url)
        .header("Authorization", sdk_key)
        .send()
        .await
        .map_err(|e| DataSourceErrorInfo::network(e.to_string(), now_millis()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        return Err(DataSourceErrorInfo::http(status, response.status().to_string(), now_millis()));
    }

    let body: PutData = response
        .json()
        .await
        .map_err(|e| DataSourceErrorInfo::network(e.to_string(), now_millis()))?;
    sink.init(body.into());
    Ok(())
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
