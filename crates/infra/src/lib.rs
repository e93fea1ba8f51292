//! Infrastructure layer: document storage, job lifecycle, scheduling.

pub mod config;
pub mod document_store;
pub mod jobs;
pub mod log;
pub mod queue;


pub use config::{ConfigError, QueueConfig};
pub use document_store::{DocumentStore, InMemoryDocumentStore, StoreError};
pub use jobs::{
    FailureHook, JobHandler, JobOutcome, JobStore, ProcessOutcome, Processor, QueueError,
    QueueResult, ScheduledJob, Scheduler, SharedHandler, handler_fn,
};
pub use log::JobLog;
pub use queue::JobQueue;
