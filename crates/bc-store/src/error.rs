use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to store: {0}")]
    Connect(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("stored JSON is structurally broken: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}
