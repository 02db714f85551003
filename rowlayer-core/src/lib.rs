//! A query-translation adapter that runs PostgREST-style table queries against
//! document stores.
//!
//! Route handlers written against a relational client keep their call chains
//! (`from(..).select(..).eq(..).range(..)`) and their `{ data, error, count }`
//! handling. This crate translates each chain onto the much smaller primitive
//! set of a document backend:
//!
//! - **Client and builder** ([`client`], [`builder`]) - Chainable, value-semantics table queries
//! - **Relationships** ([`relation`], [`select`]) - Select lists and embedded related rows
//! - **Document shape** ([`document`]) - Native envelope to caller row conversion
//! - **Native queries** ([`query`]) - Predicate, sort and pagination tokens backends understand
//! - **Backend abstraction** ([`backend`]) - Traits for implementing document backends
//! - **Results and pages** ([`result`], [`page`]) - The result envelope and page helpers
//! - **Configuration** ([`config`]) - Collection aliases, relation registry and batch sizes
//! - **Error handling** ([`error`]) - Error types and wire error codes
//!
//! # Example
//!
//! ```ignore
//! use rowlayer_core::{client::Client, builder::SelectOptions};
//!
//! let client = Client::new(backend);
//!
//! let students = client
//!     .from("students")
//!     .select_with("*, schools(name)", SelectOptions::exact_count())
//!     .eq("status", "active")
//!     .order("created_at", false)
//!     .range(0, 9)
//!     .await;
//!
//! match students.error {
//!     Some(error) => eprintln!("{}", error.message),
//!     None => println!("{} students", students.count.unwrap_or_default()),
//! }
//! ```

pub mod backend;
pub mod builder;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
mod execute;
pub mod page;
pub mod query;
pub mod relation;
pub mod result;
pub mod select;
