#![allow(dead_code)]

use async_trait::async_trait;
use rowlayer::{
    bson::Document,
    memory::InMemoryStore,
    prelude::*,
    query::{DocumentList, NativeQuery},
};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub async fn memory_store() -> InMemoryStore {
    init_tracing();
    InMemoryStore::builder().database_id("test").build().await.unwrap()
}

pub async fn memory_client() -> Client<InMemoryStore> {
    Client::new(memory_store().await)
}

pub async fn seed(client: &Client<impl DocumentBackend>, table: &str, rows: Vec<Row>) {
    let result = client.from(table).insert(rows).await;
    assert!(result.is_ok(), "seeding {table} failed: {:?}", result.error);
}

/// Records every listing sent to the wrapped store.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    inner: InMemoryStore,
    listings: Arc<Mutex<Vec<(String, NativeQuery)>>>,
}

impl RecordingBackend {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner, listings: Arc::default() }
    }

    pub fn listings(&self) -> Vec<(String, NativeQuery)> {
        self.listings.lock().unwrap().clone()
    }

    pub fn listings_of(&self, collection: &str) -> Vec<NativeQuery> {
        self.listings()
            .into_iter()
            .filter(|(name, _)| name == collection)
            .map(|(_, query)| query)
            .collect()
    }

    pub fn clear(&self) {
        self.listings.lock().unwrap().clear();
    }
}

#[async_trait]
impl DocumentBackend for RecordingBackend {
    async fn list_documents(&self, collection: &str, query: &NativeQuery) -> StoreResult<DocumentList> {
        self.listings
            .lock()
            .unwrap()
            .push((collection.to_string(), query.clone()));
        self.inner.list_documents(collection, query).await
    }

    async fn create_document(&self, collection: &str, id: &str, data: Document) -> StoreResult<Document> {
        self.inner.create_document(collection, id, data).await
    }

    async fn update_document(&self, collection: &str, id: &str, data: Document) -> StoreResult<Document> {
        self.inner.update_document(collection, id, data).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete_document(collection, id).await
    }
}

/// Fails every call touching one of the configured collections.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    inner: InMemoryStore,
    failing: HashSet<String>,
}

impl FailingBackend {
    pub fn new(inner: InMemoryStore, failing: &[&str]) -> Self {
        Self {
            inner,
            failing: failing.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn check(&self, collection: &str) -> StoreResult<()> {
        if self.failing.contains(collection) {
            return Err(StoreError::Backend(format!("{collection} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for FailingBackend {
    async fn list_documents(&self, collection: &str, query: &NativeQuery) -> StoreResult<DocumentList> {
        self.check(collection)?;
        self.inner.list_documents(collection, query).await
    }

    async fn create_document(&self, collection: &str, id: &str, data: Document) -> StoreResult<Document> {
        self.check(collection)?;
        self.inner.create_document(collection, id, data).await
    }

    async fn update_document(&self, collection: &str, id: &str, data: Document) -> StoreResult<Document> {
        self.check(collection)?;
        self.inner.update_document(collection, id, data).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check(collection)?;
        self.inner.delete_document(collection, id).await
    }
}
