//! One execution cycle of one job.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::error;

use jobq_core::{Job, JobFailure, JobId, JobOptions, JobState};

use super::error::QueueResult;
use super::store::JobStore;
use crate::document_store::DocumentStore;
use crate::log::JobLog;

/// Caller-supplied work function.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, payload: JsonValue, options: JobOptions) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn(JsonValue, JobOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: JsonValue, options: JobOptions) -> anyhow::Result<()> {
        (self)(payload, options).await
    }
}

pub type SharedHandler = Arc<dyn JobHandler>;

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(JsonValue, JobOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(f)
}

/// Observer for recorded failures; sees the full failure, of which only the
/// message is persisted. Called once archival has been attempted.
pub type FailureHook = Arc<dyn Fn(&Job, &JobFailure) + Send + Sync>;

/// How the handler ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Processed,
    /// Handler failed with this message
    Failed(String),
}

/// Result of a completed execution cycle.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub job_id: JobId,
    pub result: JobOutcome,
    /// Whether the job was still active and got archived
    pub archived: bool,
    /// Repeat successor, already persisted
    pub next: Option<Job>,
}

/// Runs the execution state machine of a job:
/// `processing → handler → processed | failed → archive → repeat successor`.
///
/// There is no claim/lease step: if two workers process the same job id
/// concurrently, both run the handler. Deployments with more than one worker
/// per store must add a conditional "claim" transition before `processing`.
pub struct Processor<S> {
    jobs: Arc<JobStore<S>>,
    log: JobLog,
    failure_hook: Option<FailureHook>,
}

impl<S> Processor<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(jobs: Arc<JobStore<S>>, log: JobLog) -> Self {
        Self {
            jobs,
            log,
            failure_hook: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.failure_hook = Some(hook);
        self
    }

    pub fn jobs(&self) -> &JobStore<S> {
        &self.jobs
    }

    /// Execute one cycle of `job`.
    ///
    /// Handler failures are recorded and swallowed. So is a failed `processed`
    /// write: it is recorded as `failed` with the store error's message. Store
    /// failures while writing `failed` or archiving are returned, after
    /// archival has been attempted; the repeat successor is only created when
    /// both succeeded.
    pub async fn process(&self, handler: SharedHandler, job: Job) -> QueueResult<ProcessOutcome> {
        self.log.processing(&job);

        // Bookkeeping must not block execution.
        if let Err(err) = self.jobs.update_status(&job, JobState::Processing, None).await {
            self.log.store_error(job.id, "processing", &err);
        }

        let failure = match run_handler(handler, &job).await {
            Ok(()) => {
                self.log.processed(&job);
                match self.jobs.update_status(&job, JobState::Processed, None).await {
                    Ok(_) => None,
                    Err(err) => {
                        self.log.store_error(job.id, "record outcome", &err);
                        Some(JobFailure::from_error(anyhow::Error::new(err)))
                    }
                }
            }
            Err(failure) => Some(failure),
        };

        let recorded = match &failure {
            Some(failure) => {
                self.log.failed(&job, failure);
                self.jobs
                    .update_status(&job, JobState::Failed, Some(failure))
                    .await
                    .map(|_| ())
            }
            None => Ok(()),
        };

        let archived = self.jobs.archive_and_delete(job.id).await;

        if let Some(failure) = &failure {
            self.notify_failure(&job, failure);
        }
        if let Err(err) = &recorded {
            self.log.store_error(job.id, "record outcome", err);
        }
        if let Err(err) = &archived {
            self.log.store_error(job.id, "archive", err);
        }
        recorded?;
        let archived = archived?;

        let next = self.jobs.create_repeat(&job).await?;

        let result = match failure {
            Some(failure) => JobOutcome::Failed(failure.message().to_string()),
            None => JobOutcome::Processed,
        };

        Ok(ProcessOutcome {
            job_id: job.id,
            result,
            archived,
            next,
        })
    }

    /// Runs the failure hook; a panicking hook is logged and otherwise ignored.
    fn notify_failure(&self, job: &Job, failure: &JobFailure) {
        let Some(hook) = &self.failure_hook else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(job, failure))) {
            let _enter = self.log.span().enter();
            error!(
                job_id = %job.id,
                panic = %panic_message(payload),
                "failure hook panicked"
            );
        }
    }
}

/// Run the handler in its own task so a panic surfaces as a failure.
async fn run_handler(handler: SharedHandler, job: &Job) -> Result<(), JobFailure> {
    let payload = job.payload.clone();
    let options = job.options;

    match tokio::spawn(async move { handler.handle(payload, options).await }).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(JobFailure::from_error(err)),
        Err(err) if err.is_panic() => Err(JobFailure::panicked(format!(
            "handler panicked: {}",
            panic_message(err.into_panic())
        ))),
        Err(_) => Err(JobFailure::cancelled()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jobq_core::{FailureKind, NewJob, Repeat};
    use serde_json::json;

    use crate::config::QueueConfig;
    use crate::document_store::InMemoryDocumentStore;

    type Store = Arc<InMemoryDocumentStore>;

    fn setup() -> (Store, Arc<JobStore<Store>>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let jobs = Arc::new(JobStore::new(
            store.clone(),
            &QueueConfig::default(),
            JobLog::silent(),
        ));
        (store, jobs)
    }

    fn ok_handler() -> SharedHandler {
        handler_fn(|_payload, _options| async { Ok::<_, anyhow::Error>(()) })
    }

    #[tokio::test]
    async fn success_records_processed_and_archives() {
        let (store, jobs) = setup();
        let processor = Processor::new(jobs.clone(), JobLog::silent());
        let job = jobs
            .create(&NewJob::new("email", json!({ "to": "a@b.com" })).unwrap())
            .await
            .unwrap();

        let outcome = processor.process(ok_handler(), job.clone()).await.unwrap();

        assert_eq!(outcome.result, JobOutcome::Processed);
        assert!(outcome.archived);
        assert!(outcome.next.is_none());
        assert_eq!(store.len("job"), 0);

        let archived = jobs.get_archived(job.id).await.unwrap().unwrap();
        let states: Vec<JobState> = archived.status.iter().map(|e| e.status).collect();
        assert_eq!(
            states,
            vec![JobState::Processed, JobState::Processing, JobState::Enqueued]
        );
    }

    #[tokio::test]
    async fn handler_receives_payload_and_options() {
        let (_store, jobs) = setup();
        let processor = Processor::new(jobs.clone(), JobLog::silent());
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let handler = handler_fn(move |payload, options| {
            let seen = seen_clone.clone();
            async move {
                *seen.lock().unwrap() = Some((payload, options));
                Ok::<_, anyhow::Error>(())
            }
        });

        let options = JobOptions::new().with_repeat(Repeat::from_millis(1000).unwrap());
        let job = jobs
            .create(&NewJob::new("report", json!([1, 2, 3])).unwrap().with_options(options))
            .await
            .unwrap();
        processor.process(handler, job).await.unwrap();

        let (payload, received) = seen.lock().unwrap().take().unwrap();
        assert_eq!(payload, json!([1, 2, 3]));
        assert_eq!(received, options);
    }

    #[tokio::test]
    async fn failure_records_message_and_invokes_hook() {
        let (_store, jobs) = setup();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let hook_calls_clone = hook_calls.clone();
        let processor = Processor::new(jobs.clone(), JobLog::silent()).with_failure_hook(
            Arc::new(move |_job: &Job, failure: &JobFailure| {
                assert_eq!(failure.kind(), FailureKind::Error);
                assert!(failure.cause().is_some());
                hook_calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let job = jobs
            .create(&NewJob::new("email", json!({})).unwrap())
            .await
            .unwrap();
        let handler = handler_fn(|_payload, _options| async {
            Err::<(), _>(anyhow::anyhow!("boom"))
        });

        let outcome = processor.process(handler, job.clone()).await.unwrap();

        assert_eq!(outcome.result, JobOutcome::Failed("boom".to_string()));
        assert!(outcome.archived);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

        let archived = jobs.get_archived(job.id).await.unwrap().unwrap();
        assert_eq!(archived.status[0].status, JobState::Failed);
        assert_eq!(archived.status[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn panicking_hook_does_not_skip_archival_or_repeat() {
        let (store, jobs) = setup();
        let processor = Processor::new(jobs.clone(), JobLog::silent())
            .with_failure_hook(Arc::new(|_job: &Job, failure: &JobFailure| {
                if failure.message() == "boom" {
                    panic!("hook bug");
                }
            }));
        let job = jobs
            .create(
                &NewJob::new("digest", json!({}))
                    .unwrap()
                    .with_options(JobOptions::new().with_repeat(Repeat::from_millis(5000).unwrap())),
            )
            .await
            .unwrap();
        let handler = handler_fn(|_payload, _options| async {
            Err::<(), _>(anyhow::anyhow!("boom"))
        });

        let outcome = processor.process(handler, job.clone()).await.unwrap();

        assert_eq!(outcome.result, JobOutcome::Failed("boom".to_string()));
        assert!(outcome.archived);
        assert!(outcome.next.is_some());
        assert_eq!(store.len("job-history"), 1);
    }

    #[tokio::test]
    async fn panicking_handler_is_recorded_as_failure() {
        let (store, jobs) = setup();
        let processor = Processor::new(jobs.clone(), JobLog::silent());
        let job = jobs
            .create(&NewJob::new("email", json!({})).unwrap())
            .await
            .unwrap();
        let handler = handler_fn(|_payload, _options| async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, anyhow::Error>(())
        });

        let outcome = processor.process(handler, job.clone()).await.unwrap();

        assert_eq!(
            outcome.result,
            JobOutcome::Failed("handler panicked: kaboom".to_string())
        );
        assert_eq!(store.len("job"), 0);
        let archived = jobs.get_archived(job.id).await.unwrap().unwrap();
        assert_eq!(archived.status[0].status, JobState::Failed);
    }

    #[tokio::test]
    async fn repeating_job_creates_successor_after_archival() {
        let (_store, jobs) = setup();
        let processor = Processor::new(jobs.clone(), JobLog::silent());
        let repeat = Repeat::from_millis(5000).unwrap();
        let job = jobs
            .create(
                &NewJob::new("digest", json!({ "user": 7 }))
                    .unwrap()
                    .with_options(JobOptions::new().with_repeat(repeat)),
            )
            .await
            .unwrap();

        let outcome = processor.process(ok_handler(), job.clone()).await.unwrap();
        let next = outcome.next.unwrap();

        assert_eq!(next.parent_id, job.id);
        assert_eq!(next.options, JobOptions::new().with_repeat(repeat));
        assert_eq!(next.state(), Some(JobState::Enqueued));
        assert!(jobs.get(job.id).await.unwrap().is_none());
        assert_eq!(jobs.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn already_archived_job_still_runs_handler() {
        let (_store, jobs) = setup();
        let processor = Processor::new(jobs.clone(), JobLog::silent());
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let handler = handler_fn(move |_payload, _options| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(()) }
        });
        let job = jobs
            .create(&NewJob::new("email", json!({})).unwrap())
            .await
            .unwrap();
        jobs.archive_and_delete(job.id).await.unwrap();

        let err = processor.process(handler, job).await.unwrap_err();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(matches!(err, super::super::QueueError::NotFound(_)));
    }
}
