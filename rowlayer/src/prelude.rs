//! Convenient re-exports of commonly used types from rowlayer.
//!
//! ```ignore
//! use rowlayer::prelude::*;
//! ```

pub use rowlayer_core::{
    backend::{DocumentBackend, DynDocumentBackend, StoreBackendBuilder},
    builder::{Payload, SelectOptions, TableQuery, UpsertOptions},
    client::Client,
    config::ClientConfig,
    document::Row,
    error::{ErrorBody, StoreError, StoreResult},
    page::{Page, PaginationParams},
    relation::{ConventionStrategy, ForeignKeyStrategy, RelationRegistry},
    result::{Data, PartialFailure, QueryResult},
    select::{Relation, SelectSpec},
};
