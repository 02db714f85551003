use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{SecondsFormat, Utc};
use futures::TryStreamExt;
use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, ReturnDocument},
    Client, Collection as MongoCollection,
};
use tracing::debug;

use rowlayer_core::{
    backend::{DocumentBackend, StoreBackendBuilder},
    document::{
        is_system_field, COLLECTION_ID_FIELD, CREATED_AT_FIELD, DATABASE_ID_FIELD, ID_FIELD,
        PERMISSIONS_FIELD, UPDATED_AT_FIELD,
    },
    error::{StoreError, StoreResult},
    query::{DocumentList, NativeQuery, QueryVisitor},
};

use crate::{
    query::MongoQueryTranslator,
    sanitizer::{ValueSanitizer, MONGO_ID_FIELD},
};

/// Server error code of a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

fn backend_error(err: MongoError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY_CODE
    )
}

// A negative limit means "single batch" to the server, so large limits clamp.
fn find_options(query: &NativeQuery) -> FindOptions {
    let mut options = FindOptions::default();

    options.limit = query.limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
    options.skip = query.offset.map(|skip| u64::try_from(skip).unwrap_or(u64::MAX));
    options.sort = MongoQueryTranslator::sort_document(&query.sorts);

    options
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Document backend persisting to one MongoDB database.
///
/// Each collection maps to a MongoDB collection. The document identifier is
/// stored as `_id`; the store-maintained timestamps are stored under escaped
/// keys and restored, together with the rest of the envelope, on every read.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(uri, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_key(collection_name))
    }

    /// Escapes user attributes of a payload, dropping reserved fields.
    fn prepare_attributes(data: Document) -> Document {
        data.into_iter()
            .filter(|(key, _)| !is_system_field(key))
            .map(|(key, value)| (ValueSanitizer::sanitize_key(&key), ValueSanitizer::sanitize_value(&value)))
            .collect()
    }

    /// Converts a stored document back into the native envelope.
    fn restore_document(&self, collection: &str, stored: &Document) -> Document {
        let mut document = Document::new();
        document.insert(ID_FIELD, stored.get(MONGO_ID_FIELD).cloned().unwrap_or(Bson::Null));

        for (key, value) in stored {
            if key != MONGO_ID_FIELD {
                document.insert(ValueSanitizer::restore_key(key), ValueSanitizer::restore_value(value));
            }
        }

        document.insert(PERMISSIONS_FIELD, Bson::Array(Vec::new()));
        document.insert(COLLECTION_ID_FIELD, collection);
        document.insert(DATABASE_ID_FIELD, self.database.as_str());

        document
    }
}

#[async_trait]
impl DocumentBackend for MongoDbStore {
    async fn list_documents(
        &self,
        collection: &str,
        query: &NativeQuery,
    ) -> StoreResult<DocumentList> {
        let filter = MongoQueryTranslator.visit_all(&query.predicates)?;
        let mongo_collection = self.get_collection(collection);
        debug!(collection, filter = %filter, "listing documents");

        let total = mongo_collection
            .count_documents(filter.clone())
            .await
            .map_err(backend_error)?;

        // MongoDB reads a zero limit as "no limit".
        if query.limit == Some(0) {
            return Ok(DocumentList { total, documents: Vec::new() });
        }

        let options = find_options(query);

        let documents = mongo_collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .iter()
            .map(|stored| self.restore_document(collection, stored))
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
        let mut stored = doc! { MONGO_ID_FIELD: id };
        stored.insert(ValueSanitizer::sanitize_key(CREATED_AT_FIELD), now.clone());
        stored.insert(ValueSanitizer::sanitize_key(UPDATED_AT_FIELD), now);
        for (key, value) in Self::prepare_attributes(data) {
            stored.insert(key, value);
        }

        match self.get_collection(collection).insert_one(&stored).await {
            Ok(_) => {
                debug!(collection, id, "document created");
                Ok(self.restore_document(collection, &stored))
            }
            Err(err) if is_duplicate_key(&err) => {
                Err(StoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()))
            }
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        let mut changes = Self::prepare_attributes(data);
        changes.insert(ValueSanitizer::sanitize_key(UPDATED_AT_FIELD), timestamp());

        let updated = self
            .get_collection(collection)
            .find_one_and_update(doc! { MONGO_ID_FIELD: id }, doc! { "$set": changes })
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend_error)?
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;
        debug!(collection, id, "document updated");

        Ok(self.restore_document(collection, &updated))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let result = self
            .get_collection(collection)
            .delete_one(doc! { MONGO_ID_FIELD: id })
            .await
            .map_err(backend_error)?;

        if result.deleted_count == 0 {
            return Err(StoreError::DocumentNotFound(id.to_string(), collection.to_string()));
        }
        debug!(collection, id, "document deleted");

        Ok(())
    }

    async fn shutdown(self) -> StoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builds a [`MongoDbStore`] from a connection string and database name.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    uri: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
        }
    }

    /// Reads `ROWLAYER_MONGODB_URI` and `ROWLAYER_DATABASE_ID`.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| StoreError::Configuration(format!("{key} is not set")))
        };

        Ok(Self::new(&require("ROWLAYER_MONGODB_URI")?, &require("ROWLAYER_DATABASE_ID")?))
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.uri)
                    .await
                    .map_err(|e| StoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| StoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
