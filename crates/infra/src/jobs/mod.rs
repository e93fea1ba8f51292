//! Persistent job lifecycle: store adapter, processor and scheduler.
//!
//! ## Flow
//!
//! ```text
//! create ─► schedule ─(timer)─► process ─► processing ─► handler ─► processed | failed
//!                                                                     │
//!                                       archive (always) ◄────────────┘
//!                                          │
//!                                          └─► create repeat successor (if `repeat` is set)
//! ```
//!
//! ## Components
//!
//! - `JobStore`: job records on top of a `DocumentStore` (active + history collections)
//! - `Processor`: runs one execution cycle of one job
//! - `Scheduler`: fires the processor once a job is due
//!
//! Status history is newest-first and only ever grows at index 0.

pub mod error;
pub mod processor;
pub mod scheduler;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use processor::{
    FailureHook, JobHandler, JobOutcome, ProcessOutcome, Processor, SharedHandler, handler_fn,
};
pub use scheduler::{ScheduledJob, Scheduler};
pub use store::JobStore;
