#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recoverability {
    Recoverable,
    Unrecoverable,
}

/// HTTP 401/403/404/405 and similar are permanent misconfigurations (bad SDK
/// key, wrong base URL); everything else, including all 5xx, 408, and 429,
/// is worth retrying.
pub fn classify_status(status: u16) -> Recoverability {
    match status {
        401 | 403 | 404 | 405 => Recoverability::Unrecoverable,
        _ => Recoverability::Recoverable,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorInfoKind {
    NetworkError,
    ErrorResponse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataSourceErrorInfo {
    pub kind: ErrorInfoKind,
    pub status_code: Option<u16>,
    pub message: String,
    pub time_millis: i64,
}

impl DataSourceErrorInfo {
    pub fn network(message: impl Into<String>, time_millis: i64) -> DataSourceErrorInfo {
        DataSourceErrorInfo {
            kind: ErrorInfoKind::NetworkError,
            status_code: None,
            message: message.into(),
            time_millis,
        }
    }

    pub fn http(status: u16, message: impl Into<String>, time_millis: i64) -> DataSourceErrorInfo {
        DataSourceErrorInfo {
            kind: ErrorInfoKind::ErrorResponse,
            status_code: Some(status),
            message: message.into(),
            time_millis,
        }
    }

    pub fn recoverability(&self) -> Recoverability {
        match self.status_code {
            Some(code) => classify_status(code),
            None => Recoverability::Recoverable,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("store error: {0}")]
    Store(#[from] ff_store::StoreError),
}
