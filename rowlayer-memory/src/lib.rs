//! In-memory document backend for rowlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `DocumentBackend` trait that emulates a hosted document store: documents
//! carry the reserved `$`-prefixed envelope fields, listings support the native
//! predicate, sort and pagination tokens, and text search matches whole words
//! only. It is meant for development and tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use rowlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().database_id("main").build().await?;
//!     let client = Client::new(backend);
//!
//!     let inserted = client
//!         .from("students")
//!         .insert(doc! { "first_name": "Alice", "city": "Stockholm" })
//!         .await;
//!     assert!(inserted.is_ok());
//!
//!     Ok(())
//! }
//! ```

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
