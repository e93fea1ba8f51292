//! Caller-facing job queue.

use std::sync::Arc;

use jobq_core::{Job, JobId, NewJob};

use crate::config::{ConfigError, QueueConfig};
use crate::document_store::DocumentStore;
use crate::jobs::{
    FailureHook, JobStore, ProcessOutcome, Processor, QueueResult, ScheduledJob, Scheduler,
    SharedHandler,
};
use crate::log::JobLog;

/// Job queue wired on top of a document store.
///
/// Scheduled timers live in memory only: after a restart, call
/// [`JobQueue::resume`] to re-arm every job still enqueued in storage.
pub struct JobQueue<S> {
    config: QueueConfig,
    log: JobLog,
    jobs: Arc<JobStore<S>>,
    processor: Arc<Processor<S>>,
    scheduler: Scheduler<S>,
}

impl<S> JobQueue<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(store: S, config: QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let log = JobLog::from_config(&config);
        let jobs = Arc::new(JobStore::new(store, &config, log.clone()));
        let processor = Arc::new(Processor::new(jobs.clone(), log.clone()));
        let scheduler = Scheduler::new(processor.clone(), log.clone())
            .with_reschedule_repeats(config.reschedule_repeats);

        Ok(Self {
            config,
            log,
            jobs,
            processor,
            scheduler,
        })
    }

    /// Install a hook that observes every handler failure in full.
    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.processor =
            Arc::new(Processor::new(self.jobs.clone(), self.log.clone()).with_failure_hook(hook));
        self.scheduler = Scheduler::new(self.processor.clone(), self.log.clone())
            .with_reschedule_repeats(self.config.reschedule_repeats);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn jobs(&self) -> &JobStore<S> {
        &self.jobs
    }

    /// Persist a new job.
    pub async fn create(&self, job: &NewJob) -> QueueResult<Job> {
        self.jobs.create(job).await
    }

    /// Arrange for `handler` to run on `job` when it is due.
    pub fn schedule(&self, handler: SharedHandler, job: Job) -> ScheduledJob {
        self.scheduler.schedule(handler, job)
    }

    /// Create and schedule in one step.
    pub async fn enqueue(&self, handler: SharedHandler, job: &NewJob) -> QueueResult<ScheduledJob> {
        let job = self.create(job).await?;
        Ok(self.schedule(handler, job))
    }

    /// Run one cycle of `job` right away, bypassing its due time.
    pub async fn process_now(&self, handler: SharedHandler, job: Job) -> QueueResult<ProcessOutcome> {
        self.processor.process(handler, job).await
    }

    /// Re-arm timers for every job still enqueued in storage.
    ///
    /// Jobs stuck in another state are reported, not re-run.
    pub async fn resume(&self, handler: SharedHandler) -> QueueResult<Vec<ScheduledJob>> {
        let stalled = self.jobs.stalled().await?;
        self.log.orphaned(&stalled);

        let pending = self.jobs.pending().await?;
        Ok(pending
            .into_iter()
            .map(|job| self.schedule(handler.clone(), job))
            .collect())
    }

    pub async fn get(&self, id: JobId) -> QueueResult<Option<Job>> {
        self.jobs.get(id).await
    }

    pub async fn get_archived(&self, id: JobId) -> QueueResult<Option<Job>> {
        self.jobs.get_archived(id).await
    }
}
