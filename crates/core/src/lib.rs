//! `jobq-core`: job queue domain building blocks.
//!
//! This crate contains **pure domain** primitives (no storage, no runtime):
//! identifiers, typed job options, the status-history model and the job record.

pub mod error;
pub mod failure;
pub mod id;
pub mod job;
pub mod options;
pub mod status;

pub use error::{CoreError, CoreResult};
pub use failure::{FailureKind, JobFailure};
pub use id::{DocumentId, JobId};
pub use job::{Job, NewJob};
pub use options::{JobOptions, Repeat, Schedule};
pub use status::{JobState, StatusEntry, status_entry};
