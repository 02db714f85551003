//! In-memory storage implementation of the document backend.
//!
//! Documents are kept per collection in insertion order, in the same native
//! envelope a hosted document store returns: user attributes next to the
//! reserved `$id`, `$createdAt`, `$updatedAt`, `$permissions`, `$collectionId`
//! and `$databaseId` fields.

use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use rowlayer_core::{
    backend::{DocumentBackend, StoreBackendBuilder},
    document::{
        is_system_field, COLLECTION_ID_FIELD, CREATED_AT_FIELD, DATABASE_ID_FIELD, ID_FIELD,
        PERMISSIONS_FIELD, UPDATED_AT_FIELD,
    },
    error::{StoreError, StoreResult},
    query::{DocumentList, NativeQuery},
};

use crate::evaluator::{compare_documents, DocumentEvaluator};

/// Database identifier stamped on documents when the builder sets none.
pub const DEFAULT_DATABASE_ID: &str = "default";

type CollectionMap = IndexMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Listings scan every document of a collection (no indexing). This is meant
/// for development and tests, not for large datasets.
///
/// # Example
///
/// ```ignore
/// use rowlayer_memory::InMemoryStore;
/// use rowlayer_core::backend::DocumentBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let created = store.create_document("users", "u1", doc! { "name": "Alice" }).await?;
/// assert_eq!(created.get_str("$id")?, "u1");
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
    database_id: Arc<str>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::with_database_id(DEFAULT_DATABASE_ID)
    }

    fn with_database_id(database_id: &str) -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            database_id: Arc::from(database_id),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Number of documents stored in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, IndexMap::len)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Reserved fields are owned by the store and never written from a payload.
fn merge_attributes(document: &mut Document, data: Document) {
    for (key, value) in data {
        if !is_system_field(&key) {
            document.insert(key, value);
        }
    }
}

#[async_trait]
impl DocumentBackend for InMemoryStore {
    async fn list_documents(
        &self,
        collection: &str,
        query: &NativeQuery,
    ) -> StoreResult<DocumentList> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(DocumentList::default()),
        };

        let mut matched = DocumentEvaluator::filter_documents(
            collection_map.values(),
            &query.predicates,
        )?;

        // Stable, so insertion order breaks ties.
        if !query.sorts.is_empty() {
            matched.sort_by(|a, b| compare_documents(a, b, &query.sorts));
        }

        let total = matched.len() as u64;
        let documents = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(DocumentList { total, documents })
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        let now = timestamp();
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if collection_map.contains_key(id) {
            return Err(StoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
        }

        let mut document = Document::new();
        document.insert(ID_FIELD, id);
        document.insert(CREATED_AT_FIELD, now.clone());
        document.insert(UPDATED_AT_FIELD, now);
        document.insert(PERMISSIONS_FIELD, Bson::Array(Vec::new()));
        document.insert(COLLECTION_ID_FIELD, collection);
        document.insert(DATABASE_ID_FIELD, self.database_id.as_ref());
        merge_attributes(&mut document, data);

        collection_map.insert(id.to_string(), document.clone());
        debug!(collection, id, "document created");

        Ok(document)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(StoreError::CollectionNotFound(collection.to_string())),
        };
        let document = match collection_map.get_mut(id) {
            Some(document) => document,
            None => return Err(StoreError::DocumentNotFound(id.to_string(), collection.to_string())),
        };

        merge_attributes(document, data);
        document.insert(UPDATED_AT_FIELD, timestamp());
        debug!(collection, id, "document updated");

        Ok(document.clone())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(StoreError::CollectionNotFound(collection.to_string())),
        };

        if collection_map.shift_remove(id).is_none() {
            return Err(StoreError::DocumentNotFound(id.to_string(), collection.to_string()));
        }
        debug!(collection, id, "document deleted");

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use rowlayer_memory::InMemoryStore;
/// use rowlayer_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().database_id("main").build().await?;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStoreBuilder {
    database_id: String,
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self { database_id: DEFAULT_DATABASE_ID.to_string() }
    }
}

impl InMemoryStoreBuilder {
    /// Sets the database identifier stamped on every document.
    pub fn database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        if self.database_id.is_empty() {
            return Err(StoreError::Initialization("database id must not be empty".into()));
        }

        Ok(InMemoryStore::with_database_id(&self.database_id))
    }
}
