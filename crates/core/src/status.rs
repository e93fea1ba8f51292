//! Status-history model.
//!
//! A job's `status` is a newest-first list of [`StatusEntry`] values. Entries are
//! only ever inserted at index 0; `status[0]` is the job's current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::failure::JobFailure;
use crate::options::JobOptions;

/// Lifecycle state recorded in a status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for its due time (or immediately due when no schedule is set)
    Enqueued,
    /// Handler is running
    Processing,
    /// Handler completed successfully
    Processed,
    /// Handler failed
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Enqueued => "enqueued",
            JobState::Processing => "processing",
            JobState::Processed => "processed",
            JobState::Failed => "failed",
        }
    }

    /// Whether the current execution cycle has finished.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Processed | JobState::Failed)
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a job's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: JobState,
    pub timestamp: DateTime<Utc>,
    /// Resolved due time; only set on `enqueued` entries built from a schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<DateTime<Utc>>,
    /// Failure message; only set on `failed` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build a status entry for `state`.
///
/// `enqueued` resolves `options.schedule` into a concrete due time; every other
/// state leaves `schedule` empty. Only the failure's message is kept.
pub fn status_entry(
    state: JobState,
    options: &JobOptions,
    error: Option<&JobFailure>,
) -> StatusEntry {
    status_entry_at(state, options, error, Utc::now())
}

pub(crate) fn status_entry_at(
    state: JobState,
    options: &JobOptions,
    error: Option<&JobFailure>,
    now: DateTime<Utc>,
) -> StatusEntry {
    let schedule = match state {
        JobState::Enqueued => options.schedule.map(|s| s.resolve(now)),
        _ => None,
    };

    StatusEntry {
        status: state,
        timestamp: now,
        schedule,
        error: error.map(|e| e.message().to_string()),
    }
}
