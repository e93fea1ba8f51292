//! Timer-driven execution of due jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::error;

use jobq_core::{Job, JobId};

use super::error::{QueueError, QueueResult};
use super::processor::{ProcessOutcome, Processor, SharedHandler};
use crate::document_store::DocumentStore;
use crate::log::JobLog;

/// Arms one-shot timers that hand due jobs to the [`Processor`].
///
/// Timers run as tasks on the ambient tokio runtime; on a current-thread
/// runtime all jobs share one thread and interleave at await points.
/// Scheduling the same job twice runs it twice.
pub struct Scheduler<S> {
    processor: Arc<Processor<S>>,
    log: JobLog,
    reschedule_repeats: bool,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            log: self.log.clone(),
            reschedule_repeats: self.reschedule_repeats,
        }
    }
}

impl<S> Scheduler<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(processor: Arc<Processor<S>>, log: JobLog) -> Self {
        Self {
            processor,
            log,
            reschedule_repeats: false,
        }
    }

    /// Schedule repeat successors with the same handler once they are created.
    pub fn with_reschedule_repeats(mut self, enabled: bool) -> Self {
        self.reschedule_repeats = enabled;
        self
    }

    /// Run `handler` on `job` once its current entry is due.
    ///
    /// The delay is `status[0].schedule - now`; a past due time or a missing
    /// schedule fires immediately. Returns without waiting for the timer.
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, handler: SharedHandler, job: Job) -> ScheduledJob {
        let delay = delay_until(job.due_at(), Utc::now());
        self.log.scheduling(&job, delay);

        let job_id = job.id;
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let result = scheduler
                .processor
                .process(handler.clone(), job)
                .await;

            match &result {
                Ok(outcome) => {
                    if let (true, Some(next)) = (scheduler.reschedule_repeats, &outcome.next) {
                        // Detached: the successor's handle is not tracked.
                        let _ = scheduler.schedule(handler, next.clone());
                    }
                }
                Err(err) => {
                    let _enter = scheduler.log.span().enter();
                    error!(job_id = %job_id, error = %err, "job processing cycle failed");
                }
            }

            result
        });

        ScheduledJob { job_id, task }
    }
}

/// Handle to a scheduled execution.
///
/// Dropping it does not cancel the timer.
#[derive(Debug)]
pub struct ScheduledJob {
    job_id: JobId,
    task: JoinHandle<QueueResult<ProcessOutcome>>,
}

impl ScheduledJob {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the execution cycle to finish.
    pub async fn wait(self) -> QueueResult<ProcessOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(QueueError::Task(err.to_string())),
        }
    }
}

/// Time left until `due`, clamped at zero. No due time means due now.
pub(crate) fn delay_until(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    due.and_then(|due| (due - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}
