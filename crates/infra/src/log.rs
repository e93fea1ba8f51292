//! Lifecycle logging sink.
//!
//! Components receive a [`JobLog`] explicitly instead of reaching for a global
//! logger; every line is emitted inside the queue's span.

use std::time::Duration;

use tracing::{Span, info, info_span, warn};

use jobq_core::{DocumentId, Job, JobFailure, JobId};

use crate::config::QueueConfig;
use crate::jobs::QueueError;

#[derive(Debug, Clone)]
pub struct JobLog {
    span: Span,
    silent: bool,
}

impl JobLog {
    pub fn new(queue: &str, silent: bool) -> Self {
        Self {
            span: info_span!("job_queue", queue = %queue),
            silent,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(&config.name, config.silent)
    }

    /// A sink that drops lifecycle lines.
    pub fn silent() -> Self {
        Self::new("jobq", true)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn adding(&self, name: &str) {
        if self.silent {
            return;
        }
        let _enter = self.span.enter();
        info!(job = name, "adding job");
    }

    pub fn scheduling(&self, job: &Job, delay: Duration) {
        if self.silent {
            return;
        }
        let _enter = self.span.enter();
        info!(
            job = %job.name,
            job_id = %job.id,
            delay_ms = delay.as_millis() as u64,
            "scheduling job"
        );
    }

    pub fn processing(&self, job: &Job) {
        if self.silent {
            return;
        }
        let _enter = self.span.enter();
        info!(job = %job.name, job_id = %job.id, "processing job");
    }

    pub fn processed(&self, job: &Job) {
        if self.silent {
            return;
        }
        let _enter = self.span.enter();
        info!(job = %job.name, job_id = %job.id, "processed job");
    }

    pub fn failed(&self, job: &Job, failure: &JobFailure) {
        if self.silent {
            return;
        }
        let _enter = self.span.enter();
        info!(
            job = %job.name,
            job_id = %job.id,
            kind = ?failure.kind(),
            error = %failure,
            "failed job"
        );
    }

    /// Store failure during `stage` of a job's lifecycle. Reported even when silent.
    pub fn store_error(&self, job_id: JobId, stage: &'static str, err: &QueueError) {
        let _enter = self.span.enter();
        warn!(job_id = %job_id, stage, error = %err, "job store operation failed");
    }

    /// Stored document skipped by a scan because it is not a valid job.
    /// Reported even when silent.
    pub fn undecodable(&self, collection: &str, id: Option<DocumentId>, err: &QueueError) {
        let _enter = self.span.enter();
        match id {
            Some(id) => warn!(collection, document_id = %id, error = %err, "skipping undecodable job document"),
            None => warn!(collection, error = %err, "skipping undecodable job document"),
        }
    }

    /// Jobs left in the active collection after their cycle finished or stalled.
    pub fn orphaned(&self, jobs: &[Job]) {
        if jobs.is_empty() {
            return;
        }
        let _enter = self.span.enter();
        for job in jobs {
            warn!(
                job = %job.name,
                job_id = %job.id,
                state = ?job.state(),
                "job is not enqueued but still active"
            );
        }
    }
}

impl Default for JobLog {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
