//! MongoDB backend implementation for rowlayer.
//!
//! This crate provides a MongoDB-based implementation of the `DocumentBackend`
//! trait, persisting documents in the native envelope shape the adapter expects.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rowlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Storage layout
//!
//! - The document identifier is stored as `_id`.
//! - Keys containing `.`, `$` or `\0` are escaped, so `$createdAt` is stored as
//!   `__dollar__createdAt`. Values are stored unchanged.
//! - `$permissions`, `$collectionId` and `$databaseId` are not stored; they are
//!   derived on every read.
//! - Text search is translated to case-insensitive, word-bounded regexes.
//!
//! # Connection
//!
//! The builder takes a MongoDB connection string and a database name, either
//! directly or from the `ROWLAYER_MONGODB_URI` and `ROWLAYER_DATABASE_ID`
//! environment variables.
//!
//! # Example
//!
//! ```ignore
//! use rowlayer::{backend::StoreBackendBuilder, mongodb::MongoDbStoreBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStoreBuilder::from_env()?.build().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod query;
pub mod sanitizer;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
