use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use crate::core::store::KvStore;

/// Work executed when a scheduled job fires.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self);
}

#[derive(Debug, Clone)]
pub struct ScheduledJobRef {
    pub name: String,
    pub id: Uuid,
}

/// Narrow interface over the external scheduler collaborator. The core never
/// evaluates cron itself; it only registers and cancels jobs by id.
#[async_trait]
pub trait SchedulerHandle: Send + Sync {
    async fn list_jobs(&self) -> Vec<ScheduledJobRef>;
    async fn run_job(&self, cron: &str, name: &str) -> Result<Uuid>;
    async fn cancel_job(&self, id: Uuid) -> Result<()>;
}

/// Production scheduler backed by tokio-cron-scheduler. Runners are
/// registered by job name up front; `run_job` attaches a registered runner
/// to a live cron entry.
pub struct CronScheduler {
    inner: Mutex<JobScheduler>,
    runners: Mutex<HashMap<String, Arc<dyn JobRunner>>>,
    live: Mutex<HashMap<String, Uuid>>,
}

impl CronScheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new().await?;
        Ok(Self {
            inner: Mutex::new(inner),
            runners: Mutex::new(HashMap::new()),
            live: Mutex::new(HashMap::new()),
        })
    }

    pub async fn register(&self, name: &str, runner: Arc<dyn JobRunner>) {
        self.runners.lock().await.insert(name.to_string(), runner);
    }

    pub async fn start(&self) -> Result<()> {
        self.inner.lock().await.start().await?;
        Ok(())
    }
}

#[async_trait]
impl SchedulerHandle for CronScheduler {
    async fn list_jobs(&self) -> Vec<ScheduledJobRef> {
        self.live
            .lock()
            .await
            .iter()
            .map(|(name, id)| ScheduledJobRef {
                name: name.clone(),
                id: *id,
            })
            .collect()
    }

    async fn run_job(&self, cron: &str, name: &str) -> Result<Uuid> {
        let runner = self
            .runners
            .lock()
            .await
            .get(name)
            .cloned()
            .with_context(|| format!("no runner registered for job {name}"))?;

        let job = Job::new_async(cron, move |_uuid, mut _l| {
            let runner = runner.clone();
            Box::pin(async move {
                runner.run().await;
            })
        })?;

        let id = self.inner.lock().await.add(job).await?;
        self.live.lock().await.insert(name.to_string(), id);
        Ok(id)
    }

    async fn cancel_job(&self, id: Uuid) -> Result<()> {
        self.inner.lock().await.remove(&id).await?;
        self.live.lock().await.retain(|_, live_id| *live_id != id);
        Ok(())
    }
}

/// A schedulable unit: its name in the scheduler and the store key its
/// persisted handle lives under.
#[derive(Debug, Clone, Copy)]
pub struct JobSpec {
    pub name: &'static str,
    pub handle_key: &'static str,
}

/// The periodic data-update job.
pub const DATA_UPDATE_JOB: JobSpec = JobSpec {
    name: "data-update",
    handle_key: crate::core::store::keys::SUMMARY_JOB_ID,
};

/// Cron expression for the poll frequency, in the seconds-leading syntax the
/// scheduler consumes.
pub fn poll_cron(frequency_minutes: u32) -> String {
    if frequency_minutes <= 1 {
        "0 * * * * *".to_string()
    } else if frequency_minutes % 60 != 0 {
        format!("0 */{frequency_minutes} * * * *")
    } else {
        "0 0 * * * *".to_string()
    }
}

/// Idempotent lifecycle management for named periodic jobs. The persisted
/// handle key is the durable source of truth for whether a job should run,
/// independent of the scheduler's live list.
pub struct JobController {
    scheduler: Arc<dyn SchedulerHandle>,
    store: Arc<dyn KvStore>,
}

impl JobController {
    pub fn new(scheduler: Arc<dyn SchedulerHandle>, store: Arc<dyn KvStore>) -> Self {
        Self { scheduler, store }
    }

    pub async fn schedule(&self, job: &JobSpec, cron: &str, reschedule: bool) -> Result<bool> {
        if let Some(existing) = self.find_job(job.name).await {
            if !reschedule {
                info!(
                    "job {} already scheduled and was not asked to reschedule",
                    job.name
                );
                return Ok(true);
            }
            info!(
                "job {} is currently scheduled; canceling before rescheduling",
                job.name
            );
            self.scheduler.cancel_job(existing.id).await?;
        }

        let id = self.scheduler.run_job(cron, job.name).await?;
        self.store.set(job.handle_key, &id.to_string()).await?;
        info!("successfully scheduled job {}", job.name);
        Ok(true)
    }

    pub async fn cancel(&self, job: &JobSpec, disable: bool) -> Result<bool> {
        let Some(existing) = self.find_job(job.name).await else {
            info!("job {} is not currently scheduled", job.name);
            return Ok(false);
        };

        self.scheduler.cancel_job(existing.id).await?;
        info!("successfully canceled job {}", job.name);

        if disable {
            self.store.del(job.handle_key).await?;
        }
        Ok(true)
    }

    pub async fn is_enabled(&self, job: &JobSpec) -> Result<bool> {
        Ok(self
            .store
            .get(job.handle_key)
            .await?
            .is_some_and(|handle| !handle.is_empty()))
    }

    /// Reconcile after a version upgrade or process restart: cancel any live
    /// registration without disabling, then reschedule iff the job was
    /// enabled beforehand. A job that survives an upgrade keeps running under
    /// the new code without double registration or silent loss.
    pub async fn on_upgrade(&self, job: &JobSpec, cron: &str) -> Result<()> {
        let was_enabled = self.is_enabled(job).await?;
        info!(
            "job {} is {} before upgrade reconciliation",
            job.name,
            if was_enabled { "enabled" } else { "disabled" }
        );

        if let Err(e) = self.cancel(job, false).await {
            error!("error canceling job {} during upgrade: {e:#}", job.name);
        }

        if was_enabled {
            self.schedule(job, cron, true).await?;
        }
        Ok(())
    }

    async fn find_job(&self, name: &str) -> Option<ScheduledJobRef> {
        self.scheduler
            .list_jobs()
            .await
            .into_iter()
            .find(|job| job.name == name)
    }
}
