use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use jobq_core::DocumentId;

use super::r#trait::{Document, DocumentStore, ID_FIELD, StoreError, document_id};

type Collections = HashMap<String, BTreeMap<DocumentId, Document>>;

/// In-memory document store.
///
/// Intended for tests/dev and single-process deployments. Every operation takes
/// the lock once, so `prepend` is atomic per document.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, collection: &str, mut document: Document) -> Result<Document, StoreError> {
        let id = match document_id(&document) {
            Some(id) => id,
            None if matches!(document.get(ID_FIELD), None | Some(JsonValue::Null)) => {
                let id = DocumentId::new();
                document.insert(ID_FIELD.to_string(), JsonValue::String(id.to_string()));
                id
            }
            None => {
                return Err(StoreError::InvalidDocument(format!(
                    "'{ID_FIELD}' is not a valid document id"
                )));
            }
        };

        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        docs.insert(id, document.clone());
        Ok(document)
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections.get(collection).and_then(|docs| docs.get(&id)).cloned())
    }

    async fn prepend(
        &self,
        collection: &str,
        id: DocumentId,
        field: &str,
        value: JsonValue,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(&id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        match document
            .entry(field.to_string())
            .or_insert_with(|| JsonValue::Array(Vec::new()))
        {
            JsonValue::Array(items) => items.insert(0, value),
            _ => {
                return Err(StoreError::InvalidDocument(format!(
                    "field '{field}' of {collection}/{id} is not an array"
                )));
            }
        }

        Ok(document.clone())
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}
