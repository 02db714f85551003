//! Error types and result types for adapter and backend operations.
//!
//! Internal code propagates [`StoreError`] with `?`. The execution boundary of a
//! query builder converts it into an [`ErrorBody`], so callers only ever see the
//! `{ data, error }` envelope.

use bson::error::Error as BsonError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Error code reported when a singleton read matched no document.
pub const NOT_FOUND_CODE: &str = "PGRST116";

/// Error code reported when `range` and `limit` were mixed on one builder.
pub const CONFLICTING_PAGINATION_CODE: &str = "PGRST103";

/// Error code reported when a document with the same identifier already exists.
pub const DUPLICATE_CODE: &str = "23505";

/// Represents all possible errors that can occur while translating or executing a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A singleton read (`single()`) matched no document.
    #[error("No document found")]
    NotFound,
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The payload or stored document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// `range` and `limit` were both applied to the same builder.
    #[error("Conflicting pagination: {0}")]
    ConflictingPagination(String),
    /// Serialization/deserialization error when converting between BSON and JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// Invalid adapter configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the wire error code callers can branch on, if this error has one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            StoreError::NotFound => Some(NOT_FOUND_CODE),
            StoreError::ConflictingPagination(_) => Some(CONFLICTING_PAGINATION_CODE),
            StoreError::DocumentAlreadyExists(..) => Some(DUPLICATE_CODE),
            _ => None,
        }
    }
}

/// A specialized `Result` type for adapter and backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// The `error` member of a result envelope.
///
/// Carries a human readable `message` and, for errors callers are expected to
/// branch on, a stable `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns `true` when this error reports a singleton read that matched nothing.
    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(NOT_FOUND_CODE)
    }
}

impl From<&StoreError> for ErrorBody {
    fn from(err: &StoreError) -> Self {
        ErrorBody {
            message: err.to_string(),
            code: err.code().map(str::to_string),
        }
    }
}

impl From<StoreError> for ErrorBody {
    fn from(err: StoreError) -> Self {
        ErrorBody::from(&err)
    }
}
