use std::sync::Arc;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::core::jobs::{DATA_UPDATE_JOB, JobController, poll_cron};
use crate::core::store::{KvStore, keys};
use crate::core::sync::DataUpdater;
use crate::core::sync::repost::{SummaryPublisher, create_summary_post};

/// Result of a manually triggered operation. Always a displayable message,
/// never a raised error across the collaborator boundary.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Delete the sync token and run one cycle immediately, forcing an
/// unconditional fetch.
pub async fn force_refresh(store: &Arc<dyn KvStore>, updater: &DataUpdater) -> ActionOutcome {
    if let Err(e) = store.del(keys::SUMMARY_LAST_MODIFIED).await {
        error!("cannot clear the sync token: {e:#}");
        return ActionOutcome::failure("ERROR: There was an error clearing the sync token.");
    }
    info!("cleared the stored sync token");

    updater.run_cycle().await;
    ActionOutcome::ok("Success: API Refreshed")
}

/// Enable and schedule the data-update job.
pub async fn start_updater(controller: &JobController, config: &AppConfig) -> ActionOutcome {
    let cron = poll_cron(config.poll_frequency_minutes);
    match controller.schedule(&DATA_UPDATE_JOB, &cron, false).await {
        Ok(_) => ActionOutcome::ok("Data Updater Started"),
        Err(e) => {
            error!("error scheduling the update job: {e:#}");
            ActionOutcome::failure("ERROR: There was an error starting the data updater.")
        }
    }
}

/// Cancel and disable the data-update job.
pub async fn stop_updater(controller: &JobController) -> ActionOutcome {
    match controller.cancel(&DATA_UPDATE_JOB, true).await {
        Ok(true) => ActionOutcome::ok("Data Updater Stopped"),
        Ok(false) => ActionOutcome::ok("Data Updater was not running"),
        Err(e) => {
            error!("error stopping the update job: {e:#}");
            ActionOutcome::failure("ERROR: There was an error stopping the data updater.")
        }
    }
}

/// Manually republish a summary post. Explicit human action: no cadence or
/// safety-floor gating, but the shared repost clock still advances.
pub async fn create_post(
    store: &Arc<dyn KvStore>,
    publisher: &Arc<dyn SummaryPublisher>,
) -> ActionOutcome {
    match create_summary_post(store, publisher).await {
        Ok(post_id) => ActionOutcome::ok(format!("Successfully created Summary Post {post_id}")),
        Err(e) => {
            error!("error creating the summary post: {e:#}");
            ActionOutcome::failure("ERROR: There was an error creating the summary post.")
        }
    }
}
