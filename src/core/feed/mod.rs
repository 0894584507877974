pub mod schema;

use reqwest::StatusCode;
use reqwest::header;
use tracing::debug;

use crate::config::AppConfig;
use crate::core::error::SyncError;

/// Result of one conditional fetch against the summary feed.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Upstream signalled the data has not changed since the supplied token.
    NotModified,
    /// Fresh payload, with the validator to persist once the cycle succeeds.
    Success {
        body: String,
        last_modified: Option<String>,
    },
}

/// Thin client over the upstream summary endpoint. Supplies the sync token
/// as an `If-Modified-Since` validator when one exists.
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.summary_api_url(),
        }
    }

    pub async fn fetch(&self, token: Option<&str>) -> Result<FetchOutcome, SyncError> {
        let mut request = self.client.get(&self.base_url);
        if let Some(token) = token {
            request = request.header(header::IF_MODIFIED_SINCE, token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("summary API returned status {status}");

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;
        Ok(FetchOutcome::Success {
            body,
            last_modified,
        })
    }
}
