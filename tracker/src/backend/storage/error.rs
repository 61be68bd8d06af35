use reqwest::StatusCode;

/// Failures raised by the store adapters
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{operation} returned {status}: {body}")]
    Remote {
        operation: String,
        status: StatusCode,
        body: String,
    },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not encode or decode stored data: {0}")]
    Serialization(#[from] serde_json::Error),
}
