//! Hourly scrape jobs, one per stored query, on top of `tokio-cron-scheduler`.

use anyhow::Result;
use chrono::Timelike;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, oneshot};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::db::StoreError;
use crate::domain::{QueryId, QueryTag};
use crate::models::Query;
use crate::services::lifecycle::{CycleOutcome, LifecycleManager};

type RunFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("job scheduler error: {0}")]
    Job(#[from] JobSchedulerError),
}

/// Hourly cron expression (seconds first) firing at the minute the query was created.
#[must_use]
pub fn hourly_cron(query: &Query) -> String {
    format!("0 {} * * * *", query.created_at.minute())
}

struct ScheduledQuery {
    job_id: Uuid,
    tag: QueryTag,
    /// Held for the duration of a run; a trigger that finds it taken is skipped.
    run_gate: Arc<Mutex<()>>,
    retry_job: Option<Uuid>,
}

struct Inner {
    sched: JobScheduler,
    lifecycle: Arc<LifecycleManager>,
    config: SchedulerConfig,
    registry: Mutex<HashMap<QueryId, ScheduledQuery>>,
    retention_job: Mutex<Option<Uuid>>,
    tracker: TaskTracker,
}

#[derive(Clone)]
pub struct QueryScheduler {
    inner: Arc<Inner>,
}

impl QueryScheduler {
    pub async fn new(lifecycle: Arc<LifecycleManager>, config: SchedulerConfig) -> Result<Self> {
        let sched = JobScheduler::new().await?;

        Ok(Self {
            inner: Arc::new(Inner {
                sched,
                lifecycle,
                config,
                registry: Mutex::new(HashMap::new()),
                retention_job: Mutex::new(None),
                tracker: TaskTracker::new(),
            }),
        })
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.inner.lifecycle
    }

    /// Registers every stored query and the retention sweep, then starts the clock.
    pub async fn start(&self) -> Result<()> {
        if !self.inner.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        let queries = self.inner.lifecycle.store().list_queries().await?;
        let mut registered = 0;
        for query in &queries {
            if self.schedule_query(query).await? {
                registered += 1;
            }
        }

        self.schedule_retention_sweep().await?;
        self.inner.sched.start().await?;

        info!(
            queries = registered,
            retention_cron = %self.inner.config.retention_cron,
            "Scheduler started"
        );
        Ok(())
    }

    async fn schedule_retention_sweep(&self) -> Result<(), SchedulerError> {
        let mut slot = self.inner.retention_job.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        let job = Job::new_async(self.inner.config.retention_cron.as_str(), move |_uuid, _lock| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(this) = Self::upgrade(&weak) else {
                    return;
                };
                let lifecycle = Arc::clone(&this.inner.lifecycle);
                let sweep = async move {
                    info!(event = "job_started", job_name = "retention_sweep", "Starting retention sweep");
                    if let Err(e) = lifecycle.sweep_retention().await {
                        error!(event = "job_failed", job_name = "retention_sweep", error = %e, "Retention sweep failed");
                    }
                };
                this.inner.tracker.track_future(sweep).await;
            })
        })?;

        *slot = Some(self.inner.sched.add(job).await?);
        Ok(())
    }

    /// Stores a new query, registers its hourly job and runs it once right away,
    /// waiting up to `first_run_timeout` for that run. Returns `false` when the
    /// query already existed, in which case nothing is scheduled.
    pub async fn create_and_schedule(
        &self,
        keywords: &str,
        location: &str,
    ) -> Result<bool, SchedulerError> {
        let query = match self
            .inner
            .lifecycle
            .store()
            .create_query(keywords, location)
            .await
        {
            Ok(query) => query,
            Err(StoreError::Conflict { .. }) => {
                info!(keywords, location, "Query already exists");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("jobfeed_new_queries_total").increment(1);
        info!(query_id = %query.id, keywords, location, "Created query");

        self.schedule_query(&query).await?;

        let done = self.run_now(query.id);
        match tokio::time::timeout(self.inner.config.first_run_timeout(), done).await {
            Ok(Ok(outcome)) => {
                debug!(query_id = %query.id, outcome = outcome.label(), "First run finished");
            }
            Ok(Err(_)) => {
                debug!(query_id = %query.id, "First run was skipped");
            }
            Err(_) => {
                warn!(
                    query_id = %query.id,
                    timeout_secs = self.inner.config.first_run_timeout_seconds,
                    "First run still in progress, continuing in background"
                );
            }
        }

        Ok(true)
    }

    /// Registers the hourly job for `query`. Returns `false` if it already had one.
    pub async fn schedule_query(&self, query: &Query) -> Result<bool, SchedulerError> {
        let mut registry = self.inner.registry.lock().await;
        if registry.contains_key(&query.id) {
            return Ok(false);
        }

        let query_id = query.id;
        let cron = hourly_cron(query);
        let weak = Arc::downgrade(&self.inner);
        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(this) = Self::upgrade(&weak) else {
                    return;
                };
                let tracker = this.inner.tracker.clone();
                tracker.track_future(this.execute(query_id, None)).await;
            })
        })?;

        let job_id = self.inner.sched.add(job).await?;
        registry.insert(
            query_id,
            ScheduledQuery {
                job_id,
                tag: query.tag(),
                run_gate: Arc::new(Mutex::new(())),
                retry_job: None,
            },
        );
        metrics::gauge!("jobfeed_scheduled_queries").set(registry.len() as f64);

        debug!(query_id = %query_id, cron = %cron, "Scheduled query");
        Ok(true)
    }

    /// Starts a run in the background. The receiver resolves with the outcome,
    /// or errors if the run was skipped.
    pub fn run_now(&self, query_id: QueryId) -> oneshot::Receiver<CycleOutcome> {
        let (tx, rx) = oneshot::channel();
        self.inner.tracker.spawn(self.execute(query_id, Some(tx)));
        rx
    }

    fn execute(&self, query_id: QueryId, done: Option<oneshot::Sender<CycleOutcome>>) -> RunFuture {
        let this = self.clone();
        Box::pin(async move {
            let gate = {
                let registry = this.inner.registry.lock().await;
                registry.get(&query_id).map(|entry| Arc::clone(&entry.run_gate))
            };

            let Some(gate) = gate else {
                debug!(query_id = %query_id, "Query is no longer scheduled, skipping run");
                return;
            };

            let Ok(_guard) = gate.try_lock_owned() else {
                debug!(query_id = %query_id, "Previous run still active, skipping trigger");
                return;
            };

            let outcome = this.inner.lifecycle.run_cycle(query_id).await;
            this.apply(query_id, outcome).await;

            if let Some(done) = done {
                let _ = done.send(outcome);
            }
        })
    }

    async fn apply(&self, query_id: QueryId, outcome: CycleOutcome) {
        if outcome.ends_schedule() {
            if let Err(e) = self.remove(query_id).await {
                error!(query_id = %query_id, error = %e, "Failed to remove query job");
            }
        } else if outcome == CycleOutcome::RetryScheduled {
            if let Err(e) = self
                .schedule_one_off(self.inner.config.retry_delay(), query_id)
                .await
            {
                error!(query_id = %query_id, error = %e, "Failed to schedule retry");
            }
        }
    }

    /// Runs the query once after `delay` without touching its hourly job. A query
    /// has at most one pending retry; returns `false` if one was already queued
    /// or the query is not scheduled.
    pub async fn schedule_one_off(
        &self,
        delay: Duration,
        query_id: QueryId,
    ) -> Result<bool, SchedulerError> {
        let mut registry = self.inner.registry.lock().await;
        let Some(entry) = registry.get_mut(&query_id) else {
            return Ok(false);
        };
        if entry.retry_job.is_some() {
            debug!(query_id = %query_id, "Retry already pending");
            return Ok(false);
        }

        let weak = Arc::downgrade(&self.inner);
        let job = Job::new_one_shot_async(delay, move |_uuid, _lock| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(this) = Self::upgrade(&weak) else {
                    return;
                };
                this.clear_retry(query_id).await;
                let tracker = this.inner.tracker.clone();
                tracker.track_future(this.execute(query_id, None)).await;
            })
        })?;

        entry.retry_job = Some(self.inner.sched.add(job).await?);
        info!(
            query_id = %query_id,
            delay_secs = delay.as_secs(),
            "Scheduled retry"
        );
        Ok(true)
    }

    async fn clear_retry(&self, query_id: QueryId) {
        if let Some(entry) = self.inner.registry.lock().await.get_mut(&query_id) {
            entry.retry_job = None;
        }
    }

    /// Cancels the query's hourly job and any pending retry.
    pub async fn remove(&self, query_id: QueryId) -> Result<bool, SchedulerError> {
        let entry = {
            let mut registry = self.inner.registry.lock().await;
            let entry = registry.remove(&query_id);
            metrics::gauge!("jobfeed_scheduled_queries").set(registry.len() as f64);
            entry
        };

        let Some(entry) = entry else {
            return Ok(false);
        };

        self.inner.sched.remove(&entry.job_id).await?;
        if let Some(retry) = entry.retry_job {
            // A fired one-shot job is already gone.
            if let Err(e) = self.inner.sched.remove(&retry).await {
                debug!(query_id = %query_id, error = %e, "Retry job already removed");
            }
        }

        info!(query_id = %query_id, tag = %entry.tag, "Removed query job");
        Ok(true)
    }

    /// Same as [`Self::remove`], looked up by (keywords, location).
    pub async fn remove_by_tag(&self, tag: &QueryTag) -> Result<bool, SchedulerError> {
        let query_id = {
            let registry = self.inner.registry.lock().await;
            registry
                .iter()
                .find(|(_, entry)| &entry.tag == tag)
                .map(|(id, _)| *id)
        };

        match query_id {
            Some(id) => self.remove(id).await,
            None => Ok(false),
        }
    }

    pub async fn scheduled_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    pub async fn is_scheduled(&self, query_id: QueryId) -> bool {
        self.inner.registry.lock().await.contains_key(&query_id)
    }

    pub async fn has_pending_retry(&self, query_id: QueryId) -> bool {
        self.inner
            .registry
            .lock()
            .await
            .get(&query_id)
            .is_some_and(|entry| entry.retry_job.is_some())
    }

    pub async fn pending_retries(&self) -> usize {
        self.inner
            .registry
            .lock()
            .await
            .values()
            .filter(|entry| entry.retry_job.is_some())
            .count()
    }

    /// Stops triggering jobs, then waits up to the grace period for runs in flight.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down scheduler");

        let mut sched = self.inner.sched.clone();
        if let Err(e) = sched.shutdown().await {
            warn!(error = %e, "Job scheduler did not stop cleanly");
        }

        let tracker = &self.inner.tracker;
        tracker.close();

        let grace = self.inner.config.shutdown_grace();
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                in_flight = tracker.len(),
                grace_secs = grace.as_secs(),
                "Runs still in flight after grace period, giving up on them"
            );
        } else {
            info!("Scheduler stopped");
        }

        Ok(())
    }
}
