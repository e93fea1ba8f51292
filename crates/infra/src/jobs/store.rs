//! Job records on top of a document store.

use serde_json::Value as JsonValue;

use jobq_core::{Job, JobFailure, JobId, JobState, NewJob, status_entry};

use super::error::{QueueError, QueueResult};
use crate::config::QueueConfig;
use crate::document_store::{Document, DocumentStore, document_id};
use crate::log::JobLog;

/// Field of a job document holding its status history.
const STATUS_FIELD: &str = "status";

/// Job store adapter.
///
/// Active jobs live in `job_collection`; archived copies are written to
/// `history_collection` under the same id.
pub struct JobStore<S> {
    store: S,
    job_collection: String,
    history_collection: String,
    log: JobLog,
}

impl<S: DocumentStore> JobStore<S> {
    pub fn new(store: S, config: &QueueConfig, log: JobLog) -> Self {
        Self {
            store,
            job_collection: config.job_collection.clone(),
            history_collection: config.history_collection.clone(),
            log,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a fresh job with a single `enqueued` entry.
    ///
    /// The id is allocated up front so `parentId` equals the job's own id.
    pub async fn create(&self, job: &NewJob) -> QueueResult<Job> {
        self.log.adding(job.name());
        self.insert(job.to_job()).await
    }

    /// Persist the repeat successor of `job`, or `None` if it does not repeat.
    ///
    /// The successor keeps `parentId`, name and payload, carries only
    /// `options.repeat` and is due one repeat interval from now.
    pub async fn create_repeat(&self, job: &Job) -> QueueResult<Option<Job>> {
        let Some(next) = job.next_cycle() else {
            return Ok(None);
        };
        self.log.adding(&next.name);
        self.insert(next).await.map(Some)
    }

    async fn insert(&self, job: Job) -> QueueResult<Job> {
        let document = to_document(&job)?;
        let created = self.store.create(&self.job_collection, document).await?;
        from_document(created)
    }

    /// Atomically prepend a new status entry to the job's history.
    ///
    /// Returns the job as stored after the update; `NotFound` if it has been
    /// archived in the meantime.
    pub async fn update_status(
        &self,
        job: &Job,
        state: JobState,
        error: Option<&JobFailure>,
    ) -> QueueResult<Job> {
        let entry = status_entry(state, &job.options, error);
        let value = serde_json::to_value(&entry)
            .map_err(|e| QueueError::InvalidDocument(format!("status entry: {e}")))?;

        match self
            .store
            .prepend(&self.job_collection, job.id.into(), STATUS_FIELD, value)
            .await
        {
            Ok(document) => from_document(document),
            Err(err) if err.is_not_found() => Err(QueueError::NotFound(job.id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Copy the job into the history collection and remove it from the active one.
    ///
    /// Both writes are issued concurrently and are not transactional: if only one
    /// of them lands, the job ends up in both collections or in neither. A job
    /// that is already gone is a no-op (`Ok(false)`).
    pub async fn archive_and_delete(&self, id: JobId) -> QueueResult<bool> {
        let Some(document) = self.store.get(&self.job_collection, id.into()).await? else {
            return Ok(false);
        };

        let (copied, deleted) = tokio::join!(
            self.store.create(&self.history_collection, document),
            self.store.delete(&self.job_collection, id.into()),
        );
        copied?;
        deleted?;
        Ok(true)
    }

    pub async fn get(&self, id: JobId) -> QueueResult<Option<Job>> {
        self.store
            .get(&self.job_collection, id.into())
            .await?
            .map(from_document)
            .transpose()
    }

    /// Archived copy of a job.
    pub async fn get_archived(&self, id: JobId) -> QueueResult<Option<Job>> {
        self.store
            .get(&self.history_collection, id.into())
            .await?
            .map(from_document)
            .transpose()
    }

    /// Active jobs whose current state is `enqueued`, oldest first.
    pub async fn pending(&self) -> QueueResult<Vec<Job>> {
        let jobs = self.active().await?;
        Ok(jobs
            .into_iter()
            .filter(|job| job.state() == Some(JobState::Enqueued))
            .collect())
    }

    /// Active jobs that are not `enqueued`: a processor started them but never
    /// archived them.
    pub async fn stalled(&self) -> QueueResult<Vec<Job>> {
        let jobs = self.active().await?;
        Ok(jobs
            .into_iter()
            .filter(|job| job.state() != Some(JobState::Enqueued))
            .collect())
    }

    /// Archived executions of one repeat lineage, oldest first.
    pub async fn archived_lineage(&self, parent_id: JobId) -> QueueResult<Vec<Job>> {
        let jobs = self.scan(&self.history_collection).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| job.parent_id == parent_id)
            .collect())
    }

    async fn active(&self) -> QueueResult<Vec<Job>> {
        self.scan(&self.job_collection).await
    }

    /// Decodable jobs of `collection`; anything else is reported and skipped.
    async fn scan(&self, collection: &str) -> QueueResult<Vec<Job>> {
        let documents = self.store.list(collection).await?;
        let mut jobs = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document_id(&document);
            match from_document(document) {
                Ok(job) => jobs.push(job),
                Err(err) => self.log.undecodable(collection, id, &err),
            }
        }
        Ok(jobs)
    }
}

fn to_document(job: &Job) -> QueueResult<Document> {
    match serde_json::to_value(job) {
        Ok(JsonValue::Object(document)) => Ok(document),
        Ok(other) => Err(QueueError::InvalidDocument(format!(
            "job {} serialized to a non-object: {other}",
            job.id
        ))),
        Err(e) => Err(QueueError::InvalidDocument(format!("job {}: {e}", job.id))),
    }
}

fn from_document(document: Document) -> QueueResult<Job> {
    let job: Job = serde_json::from_value(JsonValue::Object(document))
        .map_err(|e| QueueError::InvalidDocument(e.to_string()))?;
    job.validate()
        .map_err(|e| QueueError::InvalidDocument(format!("job {}: {e}", job.id)))?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use jobq_core::{JobOptions, Repeat, Schedule};
    use serde_json::json;

    use crate::document_store::InMemoryDocumentStore;

    fn setup() -> (Arc<InMemoryDocumentStore>, JobStore<Arc<InMemoryDocumentStore>>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let jobs = JobStore::new(store.clone(), &QueueConfig::default(), JobLog::silent());
        (store, jobs)
    }

    fn email() -> NewJob {
        NewJob::new("email", json!({ "to": "a@b.com" })).unwrap()
    }

    #[tokio::test]
    async fn create_seeds_one_enqueued_entry() {
        let (store, jobs) = setup();
        let job = jobs.create(&email()).await.unwrap();

        assert_eq!(job.parent_id, job.id);
        assert_eq!(job.status.len(), 1);
        assert_eq!(job.state(), Some(JobState::Enqueued));
        assert_eq!(job.due_at(), None);
        assert_eq!(store.len("job"), 1);

        let loaded = jobs.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn create_with_schedule_resolves_due_time() {
        let (_store, jobs) = setup();
        let at = Utc::now() + chrono::TimeDelta::hours(1);
        let job = jobs
            .create(&email().with_options(JobOptions::new().with_schedule(Schedule::at(at))))
            .await
            .unwrap();

        assert_eq!(job.due_at(), Some(at));
    }

    #[tokio::test]
    async fn update_status_prepends_newest_first() {
        let (_store, jobs) = setup();
        let job = jobs.create(&email()).await.unwrap();

        jobs.update_status(&job, JobState::Processing, None).await.unwrap();
        let failure = JobFailure::from_error(anyhow::anyhow!("boom"));
        let updated = jobs
            .update_status(&job, JobState::Failed, Some(&failure))
            .await
            .unwrap();

        let states: Vec<JobState> = updated.status.iter().map(|e| e.status).collect();
        assert_eq!(
            states,
            vec![JobState::Failed, JobState::Processing, JobState::Enqueued]
        );
        assert_eq!(updated.status[0].error.as_deref(), Some("boom"));
        // Older entries are untouched.
        assert_eq!(updated.status[2], job.status[0]);
    }

    #[tokio::test]
    async fn update_status_on_archived_job_is_not_found() {
        let (_store, jobs) = setup();
        let job = jobs.create(&email()).await.unwrap();
        assert!(jobs.archive_and_delete(job.id).await.unwrap());

        let err = jobs
            .update_status(&job, JobState::Processed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::NotFound(id) if id == job.id));
    }

    #[tokio::test]
    async fn archive_moves_record_verbatim() {
        let (store, jobs) = setup();
        let job = jobs.create(&email()).await.unwrap();
        let updated = jobs.update_status(&job, JobState::Processing, None).await.unwrap();

        let before = store.get("job", job.id.into()).await.unwrap().unwrap();
        assert!(jobs.archive_and_delete(job.id).await.unwrap());

        assert!(jobs.get(job.id).await.unwrap().is_none());
        let archived = store.get("job-history", job.id.into()).await.unwrap().unwrap();
        assert_eq!(archived, before);
        assert_eq!(jobs.get_archived(job.id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn archive_of_missing_job_is_noop() {
        let (store, jobs) = setup();
        assert!(!jobs.archive_and_delete(JobId::new()).await.unwrap());
        assert_eq!(store.len("job-history"), 0);
    }

    #[tokio::test]
    async fn create_repeat_carries_only_repeat() {
        let (_store, jobs) = setup();
        let repeat = Repeat::from_millis(5000).unwrap();
        let job = jobs
            .create(&email().with_options(
                JobOptions::new()
                    .with_schedule(Schedule::after(Duration::from_secs(60)))
                    .with_repeat(repeat),
            ))
            .await
            .unwrap();

        let next = jobs.create_repeat(&job).await.unwrap().unwrap();
        assert_ne!(next.id, job.id);
        assert_eq!(next.parent_id, job.id);
        assert_eq!(next.name, "email");
        assert_eq!(next.payload, json!({ "to": "a@b.com" }));
        assert_eq!(next.options, JobOptions::new().with_repeat(repeat));
        assert!(next.due_at().is_some());
        assert!(jobs.get(next.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_repeat_for_one_shot_job_is_none() {
        let (store, jobs) = setup();
        let job = jobs.create(&email()).await.unwrap();
        assert!(jobs.create_repeat(&job).await.unwrap().is_none());
        assert_eq!(store.len("job"), 1);
    }

    #[tokio::test]
    async fn pending_and_stalled_split_active_jobs() {
        let (_store, jobs) = setup();
        let waiting = jobs.create(&email()).await.unwrap();
        let started = jobs.create(&email()).await.unwrap();
        jobs.update_status(&started, JobState::Processing, None).await.unwrap();

        let pending: Vec<JobId> = jobs.pending().await.unwrap().iter().map(|j| j.id).collect();
        let stalled: Vec<JobId> = jobs.stalled().await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(pending, vec![waiting.id]);
        assert_eq!(stalled, vec![started.id]);
    }

    #[tokio::test]
    async fn malformed_document_is_rejected() {
        let (store, jobs) = setup();
        let id = JobId::new();
        let mut document = Document::new();
        document.insert("id".to_string(), json!(id.to_string()));
        document.insert("parentId".to_string(), json!(id.to_string()));
        document.insert("name".to_string(), json!("email"));
        document.insert("status".to_string(), json!([]));
        store.create("job", document).await.unwrap();

        let err = jobs.get(id).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn scans_skip_undecodable_documents() {
        let (store, jobs) = setup();
        let waiting = jobs.create(&email()).await.unwrap();
        let started = jobs.create(&email()).await.unwrap();
        jobs.update_status(&started, JobState::Processing, None).await.unwrap();

        let mut legacy = Document::new();
        legacy.insert("name".to_string(), json!("legacy"));
        let legacy = store.create("job", legacy).await.unwrap();
        let mut orphan = Document::new();
        orphan.insert("parentId".to_string(), json!(waiting.id.to_string()));
        store.create("job-history", orphan).await.unwrap();

        let pending: Vec<JobId> = jobs.pending().await.unwrap().iter().map(|j| j.id).collect();
        let stalled: Vec<JobId> = jobs.stalled().await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(pending, vec![waiting.id]);
        assert_eq!(stalled, vec![started.id]);

        assert!(jobs.archive_and_delete(waiting.id).await.unwrap());
        let lineage = jobs.archived_lineage(waiting.id).await.unwrap();
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].id, waiting.id);

        // Lookups by id stay strict.
        let legacy_id = document_id(&legacy).unwrap();
        let err = jobs.get(legacy_id.into()).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidDocument(_)));
    }
}
