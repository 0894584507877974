use thiserror::Error;

/// Failure taxonomy for a synchronization cycle. Every variant is caught at
/// the activation boundary, logged and alerted; none of them abort the
/// process.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("received http {status} response from the summary API: {body}")]
    Transport { status: u16, body: String },

    #[error("summary payload failed validation: {0}")]
    SchemaMismatch(String),

    #[error("summary data is stale: last update was {last_modified}, over {threshold_hours} hours ago")]
    StaleData {
        last_modified: String,
        threshold_hours: u32,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }
}
