//! Job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::id::JobId;
use crate::options::JobOptions;
use crate::status::{JobState, StatusEntry, status_entry};

/// Work submitted by a caller, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    name: String,
    payload: JsonValue,
    options: JobOptions,
}

impl NewJob {
    /// `name` labels the work type and must not be blank.
    pub fn new(name: impl Into<String>, payload: JsonValue) -> CoreResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::validation("job name must not be empty"));
        }
        Ok(Self {
            name,
            payload,
            options: JobOptions::default(),
        })
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Build the record for a fresh job: its lineage starts at its own id.
    pub fn to_job(&self) -> Job {
        let id = JobId::new();
        Job {
            id,
            parent_id: id,
            name: self.name.clone(),
            payload: self.payload.clone(),
            options: self.options,
            status: vec![status_entry(JobState::Enqueued, &self.options, None)],
        }
    }
}

/// A persisted unit of work with its status history (newest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    /// Id of the job that started this repeat lineage (its own id otherwise).
    pub parent_id: JobId,
    pub name: String,
    #[serde(default)]
    pub payload: JsonValue,
    #[serde(default)]
    pub options: JobOptions,
    pub status: Vec<StatusEntry>,
}

impl Job {
    /// Current status entry (`status[0]`).
    pub fn current(&self) -> Option<&StatusEntry> {
        self.status.first()
    }

    pub fn state(&self) -> Option<JobState> {
        self.current().map(|entry| entry.status)
    }

    /// Resolved due time of the current entry, if it carries one.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.current().and_then(|entry| entry.schedule)
    }

    pub fn is_repeating(&self) -> bool {
        self.options.repeat.is_some()
    }

    /// Check the invariants a loaded record must satisfy.
    pub fn validate(&self) -> CoreResult<()> {
        if self.status.is_empty() {
            return Err(CoreError::invariant(format!(
                "job {} has an empty status history",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::invariant(format!("job {} has an empty name", self.id)));
        }
        Ok(())
    }

    /// Build the successor for the next repeat cycle, if this job repeats.
    ///
    /// The successor keeps name, payload and lineage, carries only the `repeat`
    /// option and is due one repeat interval from now.
    pub fn next_cycle(&self) -> Option<Job> {
        let options = self.options.repeat_cycle()?;
        let schedule = self.options.next_cycle_schedule()?;
        let enqueued = status_entry(
            JobState::Enqueued,
            &JobOptions::new().with_schedule(schedule),
            None,
        );

        Some(Job {
            id: JobId::new(),
            parent_id: self.parent_id,
            name: self.name.clone(),
            payload: self.payload.clone(),
            options,
            status: vec![enqueued],
        })
    }
}
