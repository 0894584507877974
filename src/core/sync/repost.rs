use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::error::SyncError;
use crate::core::store::{KvStore, keys};

/// Minimum time between automated reposts, independent of the configured
/// cadence. Change-triggered reposts bypass the cadence clock but never this.
pub const REPOST_SAFETY_PERIOD_MS: i64 = 3 * 3_600_000;

/// External collaborator that submits a new summary post and returns its
/// identifier. How the post is rendered is not this crate's concern.
#[async_trait]
pub trait SummaryPublisher: Send + Sync {
    async fn submit_summary_post(&self) -> Result<String, SyncError>;
}

/// Publisher that posts a create-post request to a configured endpoint and
/// reads the new post id from the response.
pub struct HttpPublisher {
    client: reqwest::Client,
    publish_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    id: String,
}

impl HttpPublisher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            publish_url: config.publish_url.clone(),
        }
    }
}

#[async_trait]
impl SummaryPublisher for HttpPublisher {
    async fn submit_summary_post(&self) -> Result<String, SyncError> {
        let Some(url) = self.publish_url.as_ref().filter(|u| !u.is_empty()) else {
            return Err(SyncError::configuration(
                "no publish_url configured; cannot create a summary post",
            ));
        };

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "title": "Tropical Weather Summary",
                "kind": "summary"
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PublishResponse = response.json().await?;
        Ok(parsed.id)
    }
}

/// Metadata persisted for every post this service creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Summary,
    Storm,
    Recon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMetadata {
    #[serde(rename = "type")]
    pub kind: PostKind,
}

/// Submit a new summary post through the collaborator, then persist its
/// metadata and advance the shared repost clock.
pub async fn create_summary_post(
    store: &Arc<dyn KvStore>,
    publisher: &Arc<dyn SummaryPublisher>,
) -> Result<String> {
    let post_id = publisher.submit_summary_post().await?;
    info!(%post_id, "created summary post");

    let metadata = serde_json::to_string(&PostMetadata {
        kind: PostKind::Summary,
    })?;
    store.set(&keys::post_metadata(&post_id), &metadata).await?;
    store
        .set(
            keys::SUMMARY_LAST_REPOSTED,
            &Utc::now().timestamp_millis().to_string(),
        )
        .await?;

    Ok(post_id)
}

/// The two policies gating an automated republish: a fixed safety floor and
/// an optional timer cadence. Both share one rate-limit clock in the store.
pub struct RepostPolicy {
    store: Arc<dyn KvStore>,
    publisher: Arc<dyn SummaryPublisher>,
    automate: bool,
    cadence_hours: u32,
}

impl RepostPolicy {
    pub fn new(
        store: Arc<dyn KvStore>,
        publisher: Arc<dyn SummaryPublisher>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            automate: config.automate_reposts,
            cadence_hours: config.repost_cadence_hours,
        }
    }

    /// Whether automated reposting may happen at all this cycle. On the first
    /// observation the repost clock is initialized to now without reposting,
    /// so a fresh install never fires a spurious post.
    pub async fn allow_automation(&self, now_ms: i64) -> Result<bool> {
        if !self.automate {
            return Ok(false);
        }

        match self.last_reposted().await? {
            None => {
                self.store
                    .set(keys::SUMMARY_LAST_REPOSTED, &now_ms.to_string())
                    .await?;
                info!("no last repost time saved; initializing the repost clock to now");
                Ok(false)
            }
            Some(last) if now_ms - last <= REPOST_SAFETY_PERIOD_MS => {
                debug!("last repost was within the safety period; skipping");
                Ok(false)
            }
            Some(_) => Ok(true),
        }
    }

    /// Repost on the configured cadence, regardless of content changes.
    /// Returns whether a repost was triggered. A cadence of 0 means reposts
    /// happen only on detected changes, never on a timer.
    pub async fn repost_if_cadence_elapsed(&self, now_ms: i64) -> Result<bool> {
        if self.cadence_hours == 0 {
            return Ok(false);
        }

        let Some(last) = self.last_reposted().await? else {
            return Ok(false);
        };
        if now_ms - last < i64::from(self.cadence_hours) * 3_600_000 {
            return Ok(false);
        }

        info!("repost cadence reached; reposting");
        let post_id = create_summary_post(&self.store, &self.publisher).await?;
        debug!(%post_id, "cadence repost complete");
        Ok(true)
    }

    async fn last_reposted(&self) -> Result<Option<i64>> {
        let Some(raw) = self.store.get(keys::SUMMARY_LAST_REPOSTED).await? else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(ms) => Ok(Some(ms)),
            Err(e) => {
                warn!("stored repost time '{raw}' is unreadable: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR_MS: i64 = 3_600_000;
    const NOW_MS: i64 = 1_700_000_000_000;

    pub struct RecordingPublisher {
        pub calls: AtomicUsize,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SummaryPublisher for RecordingPublisher {
        async fn submit_summary_post(&self) -> Result<String, SyncError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("post-{n}"))
        }
    }

    fn policy(
        automate: bool,
        cadence_hours: u32,
    ) -> (RepostPolicy, Arc<dyn KvStore>, Arc<RecordingPublisher>) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let config = AppConfig {
            automate_reposts: automate,
            repost_cadence_hours: cadence_hours,
            ..AppConfig::default()
        };
        let policy = RepostPolicy::new(
            store.clone(),
            publisher.clone() as Arc<dyn SummaryPublisher>,
            &config,
        );
        (policy, store, publisher)
    }

    async fn set_last_reposted(store: &Arc<dyn KvStore>, ms: i64) {
        store
            .set(keys::SUMMARY_LAST_REPOSTED, &ms.to_string())
            .await
            .expect("set");
    }

    #[tokio::test]
    async fn automation_off_is_always_denied() {
        let (policy, store, _) = policy(false, 0);
        assert!(!policy.allow_automation(NOW_MS).await.expect("allow"));
        // the repost clock is not even initialized
        assert_eq!(
            store.get(keys::SUMMARY_LAST_REPOSTED).await.expect("get"),
            None
        );
    }

    #[tokio::test]
    async fn cold_start_initializes_clock_without_allowing() {
        let (policy, store, _) = policy(true, 0);
        assert!(!policy.allow_automation(NOW_MS).await.expect("allow"));
        assert_eq!(
            store.get(keys::SUMMARY_LAST_REPOSTED).await.expect("get"),
            Some(NOW_MS.to_string())
        );
        // still inside the safety period on the next call
        assert!(!policy.allow_automation(NOW_MS + 1).await.expect("allow"));
    }

    #[tokio::test]
    async fn safety_floor_blocks_recent_reposts() {
        let (policy, store, _) = policy(true, 0);
        set_last_reposted(&store, NOW_MS - HOUR_MS).await;
        assert!(!policy.allow_automation(NOW_MS).await.expect("allow"));

        set_last_reposted(&store, NOW_MS - 4 * HOUR_MS).await;
        assert!(policy.allow_automation(NOW_MS).await.expect("allow"));
    }

    #[tokio::test]
    async fn zero_cadence_never_reposts_on_a_timer() {
        let (policy, store, publisher) = policy(true, 0);
        set_last_reposted(&store, NOW_MS - 100 * HOUR_MS).await;
        assert!(!policy.repost_if_cadence_elapsed(NOW_MS).await.expect("run"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cadence_reposts_once_elapsed_and_advances_the_clock() {
        let (policy, store, publisher) = policy(true, 6);
        set_last_reposted(&store, NOW_MS - 7 * HOUR_MS).await;

        assert!(policy.repost_if_cadence_elapsed(NOW_MS).await.expect("run"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);

        // the clock advanced, so an immediate second check does not fire
        let advanced: i64 = store
            .get(keys::SUMMARY_LAST_REPOSTED)
            .await
            .expect("get")
            .expect("value")
            .parse()
            .expect("parse");
        assert!(advanced > NOW_MS - 7 * HOUR_MS);
        assert!(
            !policy
                .repost_if_cadence_elapsed(NOW_MS)
                .await
                .expect("run")
        );
    }

    #[tokio::test]
    async fn cadence_below_threshold_does_not_fire() {
        let (policy, store, publisher) = policy(true, 6);
        set_last_reposted(&store, NOW_MS - 5 * HOUR_MS).await;
        assert!(!policy.repost_if_cadence_elapsed(NOW_MS).await.expect("run"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_summary_post_persists_metadata_and_clock() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let publisher: Arc<dyn SummaryPublisher> = Arc::new(RecordingPublisher::new());

        let post_id = create_summary_post(&store, &publisher).await.expect("post");
        assert_eq!(post_id, "post-0");

        let metadata = store
            .get(&keys::post_metadata(&post_id))
            .await
            .expect("get")
            .expect("metadata");
        let parsed: PostMetadata = serde_json::from_str(&metadata).expect("parse");
        assert!(matches!(parsed.kind, PostKind::Summary));
        assert!(
            store
                .get(keys::SUMMARY_LAST_REPOSTED)
                .await
                .expect("get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn publisher_without_target_is_a_configuration_error() {
        let publisher = HttpPublisher::new(&AppConfig::default());
        let err = publisher.submit_summary_post().await.expect_err("must fail");
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn post_metadata_rejects_unknown_kinds() {
        assert!(serde_json::from_str::<PostMetadata>(r#"{"type":"summary"}"#).is_ok());
        assert!(serde_json::from_str::<PostMetadata>(r#"{"type":"storm"}"#).is_ok());
        assert!(serde_json::from_str::<PostMetadata>(r#"{"type":"megathread"}"#).is_err());
    }
}
