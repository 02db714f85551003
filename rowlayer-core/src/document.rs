//! Native document envelope and the caller-facing row shape.
//!
//! Backends return documents in their native envelope: user attributes next to
//! reserved, `$`-prefixed system fields. Callers work with rows, which expose the
//! identifier as `id` and the timestamps as `created_at` / `updated_at`.
//!
//! The two transforms in this module are symmetric but not inverse:
//!
//! - [`to_native_payload`] drops every reserved field and `id` from a write payload.
//!   The identifier travels next to the payload, never inside it.
//! - [`from_native`] copies user attributes and derives `id`, `created_at` and
//!   `updated_at` from the reserved fields. Other reserved fields (permissions,
//!   collection and database linkage) are dropped and cannot be recovered.

use bson::{Bson, Document};
use uuid::Uuid;

/// A document in caller shape.
pub type Row = Document;

/// Prefix shared by every reserved field of the native envelope.
pub const SYSTEM_PREFIX: char = '$';
/// Native identifier field.
pub const ID_FIELD: &str = "$id";
/// Native creation timestamp field.
pub const CREATED_AT_FIELD: &str = "$createdAt";
/// Native last-modification timestamp field.
pub const UPDATED_AT_FIELD: &str = "$updatedAt";
/// Native permission list field.
pub const PERMISSIONS_FIELD: &str = "$permissions";
/// Native owning collection field.
pub const COLLECTION_ID_FIELD: &str = "$collectionId";
/// Native owning database field.
pub const DATABASE_ID_FIELD: &str = "$databaseId";

/// Caller-facing identifier field.
pub const ROW_ID: &str = "id";
/// Caller-facing creation timestamp field.
pub const ROW_CREATED_AT: &str = "created_at";
/// Caller-facing last-modification timestamp field.
pub const ROW_UPDATED_AT: &str = "updated_at";

/// Returns `true` for fields owned by the store.
pub fn is_system_field(field: &str) -> bool {
    field.starts_with(SYSTEM_PREFIX)
}

/// Maps a caller field name to the native field it is stored under.
///
/// Only the identifier is renamed; every other field passes through unchanged.
pub fn map_field(field: &str) -> &str {
    if field == ROW_ID { ID_FIELD } else { field }
}

/// Maps a caller sort field to the native field it is stored under.
///
/// Rows expose the store-maintained timestamps, so ordering by them must sort on
/// the reserved fields they are derived from.
pub fn map_sort_field(field: &str) -> &str {
    match field {
        ROW_CREATED_AT => CREATED_AT_FIELD,
        ROW_UPDATED_AT => UPDATED_AT_FIELD,
        other => map_field(other),
    }
}

/// Strips reserved fields and the caller `id` from a write payload.
pub fn to_native_payload(row: &Row) -> Document {
    row.iter()
        .filter(|(key, _)| !is_system_field(key) && key.as_str() != ROW_ID)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Converts a native document into a caller row.
pub fn from_native(document: &Document) -> Row {
    let mut row: Row = document
        .iter()
        .filter(|(key, _)| !is_system_field(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    row.insert(ROW_ID, document.get(ID_FIELD).cloned().unwrap_or(Bson::Null));
    row.insert(ROW_CREATED_AT, document.get(CREATED_AT_FIELD).cloned().unwrap_or(Bson::Null));
    row.insert(ROW_UPDATED_AT, document.get(UPDATED_AT_FIELD).cloned().unwrap_or(Bson::Null));

    row
}

/// Returns the native identifier of a document, if it carries one.
pub fn native_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Bson::as_str)
}

/// Returns the identifier explicitly supplied by the caller in a payload.
///
/// Empty strings and nulls count as absent. Integer identifiers are accepted and
/// rendered as strings.
pub fn supplied_id(row: &Row) -> Option<String> {
    match row.get(ROW_ID)? {
        Bson::String(id) if !id.is_empty() => Some(id.clone()),
        Bson::Int32(id) => Some(id.to_string()),
        Bson::Int64(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Generates a fresh, unique document identifier.
pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Returns `true` when a value counts as "present" for key lookups.
///
/// Nulls, empty strings and `false` are treated as absent.
pub fn is_present(value: Option<&Bson>) -> bool {
    match value {
        None | Some(Bson::Null) | Some(Bson::Boolean(false)) => false,
        Some(Bson::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
