pub mod repost;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::core::error::SyncError;
use crate::core::feed::schema::{Summary, parse_summary};
use crate::core::feed::{FeedClient, FetchOutcome};
use crate::core::jobs::JobRunner;
use crate::core::notify::Notifier;
use crate::core::store::{KvStore, keys};
use repost::{RepostPolicy, SummaryPublisher, create_summary_post};

mod alerts {
    use crate::core::error::SyncError;

    const HEADER: &str = "# stormwatch alerts";

    pub fn stale_data(err: &SyncError) -> String {
        format!("{HEADER}\n\n## Data Updater - Stale Data Detected\n\n{err}")
    }

    pub fn fetch_failed(err: &SyncError) -> String {
        format!("{HEADER}\n\n## Data Updater - API Call Failed\n\n{err}")
    }

    pub fn schema_mismatch(err: &SyncError) -> String {
        format!("{HEADER}\n\n## Data Updater - Payload Validation Failed\n\n{err}")
    }

    pub fn general_failure(err: &anyhow::Error) -> String {
        format!(
            "{HEADER}\n\n## Data Updater - General Failure\n\nAn error was encountered while processing data updates:\n```\n{err:#}\n```"
        )
    }
}

/// Runs one synchronization cycle: conditional fetch, staleness check,
/// validation, cache write and change detection. All cross-run state lives
/// in the key-value store; each cycle re-reads it.
pub struct DataUpdater {
    store: Arc<dyn KvStore>,
    feed: FeedClient,
    notifier: Arc<Notifier>,
    repost: RepostPolicy,
    publisher: Arc<dyn SummaryPublisher>,
    stale_hours: u32,
}

impl DataUpdater {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn KvStore>,
        notifier: Arc<Notifier>,
        publisher: Arc<dyn SummaryPublisher>,
    ) -> Self {
        Self {
            feed: FeedClient::new(config),
            repost: RepostPolicy::new(store.clone(), publisher.clone(), config),
            store,
            notifier,
            publisher,
            stale_hours: config.stale_hours,
        }
    }

    /// Activation boundary: every failure is logged and alerted best-effort;
    /// nothing propagates. The next scheduled cycle retries independently.
    pub async fn run_cycle(&self) {
        info!("data update cycle started");
        if let Err(e) = self.run_once().await {
            error!("error during update cycle: {e:#}");
            if self.notifier.enabled() {
                self.notifier.send(&alerts::general_failure(&e)).await;
            } else {
                warn!("notifier is disabled, so no failure alert was sent");
            }
        }
    }

    async fn run_once(&self) -> anyhow::Result<()> {
        let now_ms = Utc::now().timestamp_millis();

        // Computed up front so a fresh install initializes the repost clock
        // on its very first cycle, whatever the fetch outcome.
        let automation_allowed = self.repost.allow_automation(now_ms).await?;
        debug!("repost automation allowed this cycle: {automation_allowed}");

        let token = self
            .store
            .get(keys::SUMMARY_LAST_MODIFIED)
            .await?
            .filter(|t| !t.is_empty());
        debug!("stored sync token: {token:?}");

        match self.feed.fetch(token.as_deref()).await {
            Ok(FetchOutcome::NotModified) => {
                info!("summary API returned 304 (no updates)");
                if let Some(token) = &token
                    && token_age_exceeds(token, self.stale_hours, now_ms)
                {
                    let err = SyncError::StaleData {
                        last_modified: token.clone(),
                        threshold_hours: self.stale_hours,
                    };
                    warn!("{err}");
                    self.notifier.send(&alerts::stale_data(&err)).await;
                    return Ok(());
                }
                if automation_allowed {
                    self.repost.repost_if_cadence_elapsed(now_ms).await?;
                }
                Ok(())
            }

            Err(err @ SyncError::Transport { .. }) => {
                // Reported, not fatal: the next scheduled run retries.
                error!("{err}");
                self.notifier.send(&alerts::fetch_failed(&err)).await;
                Ok(())
            }

            Err(e) => Err(e.into()),

            Ok(FetchOutcome::Success {
                body,
                last_modified,
            }) => {
                self.apply_update(&body, last_modified, automation_allowed, now_ms)
                    .await
            }
        }
    }

    async fn apply_update(
        &self,
        body: &str,
        last_modified: Option<String>,
        automation_allowed: bool,
        now_ms: i64,
    ) -> anyhow::Result<()> {
        // Read the outgoing snapshot before overwriting it, for the delta
        // comparison after the write.
        let previous = if automation_allowed {
            self.previous_summary().await
        } else {
            None
        };

        let summary = match parse_summary(body) {
            Ok(summary) => summary,
            Err(err) => {
                // Hard error for this cycle: neither snapshot nor token move.
                error!("{err}");
                self.notifier.send(&alerts::schema_mismatch(&err)).await;
                return Ok(());
            }
        };

        // Snapshot first, token last. A crash in between leaves an old token
        // behind, and the next cycle simply re-fetches unconditionally.
        self.store.set(keys::SUMMARY_DATA, body).await?;
        info!("saved new summary snapshot");

        match last_modified {
            Some(last_modified) => {
                self.store
                    .set(keys::SUMMARY_LAST_MODIFIED, &last_modified)
                    .await?;
                info!("saved sync token {last_modified}");
            }
            None => warn!("summary API did not return a last modified date"),
        }

        if !automation_allowed {
            debug!("repost automation is disabled or rate limited");
            return Ok(());
        }

        if self.repost.repost_if_cadence_elapsed(now_ms).await? {
            return Ok(());
        }

        let Some(previous) = previous else {
            info!("no previous snapshot to compare with; check happens on the next update");
            return Ok(());
        };

        if summary.two.count > previous.two.count || summary.atcf.count > previous.atcf.count {
            info!("new activity in the outlook or track data; reposting");
            let post_id = create_summary_post(&self.store, &self.publisher).await?;
            info!(%post_id, "republished summary post for new activity");
        }

        Ok(())
    }

    async fn previous_summary(&self) -> Option<Summary> {
        match self.store.get(keys::SUMMARY_DATA).await {
            Ok(Some(raw)) => match parse_summary(&raw) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    // A drifted old snapshot must not wedge the pipeline;
                    // comparison resumes once a fresh snapshot lands.
                    warn!("stored snapshot no longer matches the schema: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("cannot read the previous snapshot: {e:#}");
                None
            }
        }
    }
}

#[async_trait]
impl JobRunner for DataUpdater {
    async fn run(&self) {
        self.run_cycle().await;
    }
}

/// Whether a sync token's age exceeds the staleness threshold. Unparseable
/// tokens are treated as not stale; the condition cannot be evaluated.
fn token_age_exceeds(token: &str, stale_hours: u32, now_ms: i64) -> bool {
    match DateTime::parse_from_rfc2822(token) {
        Ok(parsed) => now_ms - parsed.timestamp_millis() > i64::from(stale_hours) * 3_600_000,
        Err(e) => {
            warn!("cannot parse sync token '{token}': {e}");
            false
        }
    }
}
