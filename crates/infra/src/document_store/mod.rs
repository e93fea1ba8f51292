//! Collection-oriented document store boundary.
//!
//! The job queue persists through this abstraction only, so any document
//! database offering create/get/delete by id plus an atomic "insert at head of
//! array" update can back it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDocumentStore;
pub use r#trait::{Document, DocumentStore, ID_FIELD, StoreError, document_id};
