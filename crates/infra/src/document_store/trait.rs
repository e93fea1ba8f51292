use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use jobq_core::DocumentId;

/// A stored record: a JSON object whose `id` key holds its [`DocumentId`].
pub type Document = serde_json::Map<String, JsonValue>;

/// Key under which a document's id is stored.
pub const ID_FIELD: &str = "id";

/// Read the id of a document, if it carries a valid one.
pub fn document_id(document: &Document) -> Option<DocumentId> {
    document
        .get(ID_FIELD)
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse().ok())
}

/// Document store operation error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: DocumentId },

    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: DocumentId },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The backing store could not serve the request (connection loss, poisoned lock, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: DocumentId) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Generic document store, grouped into named collections.
///
/// ## Semantics
///
/// - `create` assigns a fresh id under [`ID_FIELD`] unless the document already
///   carries a valid one; ids are unique per collection
/// - `prepend` must be atomic per document: concurrent prepends to the same
///   array never lose or reorder entries
/// - no operation spans collections; callers that write to two collections
///   accept that one write may land without the other
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return it with its id.
    async fn create(&self, collection: &str, document: Document) -> Result<Document, StoreError>;

    /// Fetch a document by id.
    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Atomically insert `value` at index 0 of the array under `field`.
    ///
    /// Returns the updated document, or `NotFound` if it no longer exists.
    async fn prepend(
        &self,
        collection: &str,
        id: DocumentId,
        field: &str,
        value: JsonValue,
    ) -> Result<Document, StoreError>;

    /// Remove a document; returns whether anything was removed.
    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError>;

    /// All documents of a collection, in id order.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn create(&self, collection: &str, document: Document) -> Result<Document, StoreError> {
        (**self).create(collection, document).await
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>, StoreError> {
        (**self).get(collection, id).await
    }

    async fn prepend(
        &self,
        collection: &str,
        id: DocumentId,
        field: &str,
        value: JsonValue,
    ) -> Result<Document, StoreError> {
        (**self).prepend(collection, id, field, value).await
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError> {
        (**self).delete(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        (**self).list(collection).await
    }
}
