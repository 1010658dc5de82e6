#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("persistent store is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to serialize item: {0}")]
    Serialize(String),
    #[error("failed to deserialize item: {0}")]
    Deserialize(String),
}
