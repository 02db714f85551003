//! Document backend abstraction.
//!
//! [`DocumentBackend`] is the primitive substrate the adapter translates onto. It
//! only knows how to list documents with a flat [`NativeQuery`] and how to create,
//! partially update and delete a single document by identifier. It has no joins,
//! no bulk writes and no upsert by arbitrary key.
//!
//! Documents crossing this boundary are in native envelope shape (see
//! [`crate::document`]): backends own the reserved `$`-prefixed fields and must
//! stamp `$id`, `$createdAt` and `$updatedAt` on every document they return.
//!
//! # Example
//!
//! ```ignore
//! use rowlayer::backend::DocumentBackend;
//! use rowlayer::query::{NativeQuery, Predicate};
//! use bson::doc;
//!
//! let created = backend
//!     .create_document("users", "u1", doc! { "name": "Alice" })
//!     .await?;
//! let listed = backend
//!     .list_documents(
//!         "users",
//!         &NativeQuery::builder().predicate(Predicate::equal("name", "Alice")).build(),
//!     )
//!     .await?;
//! assert_eq!(listed.total, 1);
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::StoreResult,
    query::{DocumentList, NativeQuery},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The adapter never serializes calls
/// across builders, so two builders writing the same document race on the
/// backend's own consistency guarantees.
///
/// # Error Handling
///
/// Operations return [`StoreResult`]. The adapter converts every error into the
/// result envelope at its execution boundary; backends never need to.
#[async_trait]
pub trait DocumentBackend: Send + Sync + Debug {
    /// Lists documents of a collection.
    ///
    /// Every predicate must match. Sort keys apply in order; limit and offset apply
    /// after sorting. [`DocumentList::total`] counts all matches before pagination.
    /// Listing a collection that does not exist returns an empty list.
    async fn list_documents(
        &self,
        collection: &str,
        query: &NativeQuery,
    ) -> StoreResult<DocumentList>;

    /// Creates a document under the given identifier and returns it in envelope shape.
    ///
    /// `data` never contains reserved fields. Fails with
    /// [`StoreError::DocumentAlreadyExists`](crate::error::StoreError::DocumentAlreadyExists)
    /// when the identifier is taken.
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document>;

    /// Merges `data` into an existing document and returns the updated envelope.
    ///
    /// Fields absent from `data` are left untouched. Fails with
    /// [`StoreError::DocumentNotFound`](crate::error::StoreError::DocumentNotFound)
    /// when no document has the identifier.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document>;

    /// Deletes a document by identifier.
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> DocumentBackend for &B
where
    B: DocumentBackend + ?Sized,
{
    async fn list_documents(
        &self,
        collection: &str,
        query: &NativeQuery,
    ) -> StoreResult<DocumentList> {
        (**self)
            .list_documents(collection, query)
            .await
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        (**self)
            .create_document(collection, id, data)
            .await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        (**self)
            .update_document(collection, id, data)
            .await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        (**self)
            .delete_document(collection, id)
            .await
    }
}

#[async_trait]
impl<B> DocumentBackend for Box<B>
where
    B: DocumentBackend + ?Sized,
{
    async fn list_documents(
        &self,
        collection: &str,
        query: &NativeQuery,
    ) -> StoreResult<DocumentList> {
        (**self)
            .list_documents(collection, query)
            .await
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        (**self)
            .create_document(collection, id, data)
            .await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        (**self)
            .update_document(collection, id, data)
            .await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        (**self)
            .delete_document(collection, id)
            .await
    }
}

#[async_trait]
impl<B> DocumentBackend for Arc<B>
where
    B: DocumentBackend + ?Sized,
{
    async fn list_documents(
        &self,
        collection: &str,
        query: &NativeQuery,
    ) -> StoreResult<DocumentList> {
        (**self)
            .list_documents(collection, query)
            .await
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        (**self)
            .create_document(collection, id, data)
            .await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> StoreResult<Document> {
        (**self)
            .update_document(collection, id, data)
            .await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        (**self)
            .delete_document(collection, id)
            .await
    }
}

/// A boxed backend for selecting the store at runtime.
pub type DynDocumentBackend = Box<dyn DocumentBackend>;

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: DocumentBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
