//! Main rowlayer crate: a PostgREST-style query builder over document stores.
//!
//! This crate is the primary entry point. It re-exports the adapter from
//! `rowlayer-core` and provides access to the storage backends.
//!
//! # Features
//!
//! - **Familiar call chains** - `from(..).select(..).eq(..).range(..)` with `{ data, error, count }` results
//! - **Relationship embedding** - `select("*, schools(name)")` resolved with one lookup per relation
//! - **Upserts by conflict key** - Single or composite keys, with per-item failure reporting
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use rowlayer::{prelude::*, memory::InMemoryStore};
//! use rowlayer::bson::doc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new(InMemoryStore::builder().build().await.unwrap());
//!
//!     client
//!         .from("schools")
//!         .insert(doc! { "id": "sc1", "name": "KTH" })
//!         .await;
//!     client
//!         .from("students")
//!         .insert(doc! { "first_name": "Alice", "school_id": "sc1", "city": "Stockholm" })
//!         .await;
//!
//!     let students = client
//!         .from("students")
//!         .select_with("*, schools(name)", SelectOptions::exact_count())
//!         .ilike("city", "%stockholm%")
//!         .order("created_at", false)
//!         .range(0, 9)
//!         .await;
//!
//!     println!("{:?} of {:?}", students.data, students.count);
//!
//!     client.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Singleton reads
//!
//! `single()` reports a missing row as an error with code `PGRST116`, which
//! callers can tell apart from backend failures; `maybe_single()` resolves to
//! null data instead.
//!
//! ```ignore
//! let result = client.from("students").select("*").eq("id", "missing").single().await;
//! assert!(result.is_not_found());
//! ```
//!
//! # Dynamic Dispatch
//!
//! When the backend is chosen at runtime, erase its type with `into_dyn`:
//!
//! ```ignore
//! use rowlayer::{prelude::*, memory::InMemoryStore};
//!
//! let client: Client<DynDocumentBackend> =
//!     Client::new(InMemoryStore::builder().build().await?).into_dyn();
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use rowlayer_core::{
    backend, builder, client, config, document, error, page, query, relation, result, select,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use rowlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use rowlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
