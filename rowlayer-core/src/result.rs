//! The result envelope every builder execution resolves to.
//!
//! Executions never fail with a Rust error. They always produce a
//! [`QueryResult`] whose shape matches what PostgREST clients return:
//!
//! ```json
//! { "data": [...], "error": null, "count": 42 }
//! ```
//!
//! Exactly one of `data` and `error` is meaningful. `count` is present only when an
//! exact count was requested. `partialFailures` lists upsert items that could not
//! be written while the rest of the batch succeeded.

use serde::{Deserialize, Serialize};

use crate::{
    document::Row,
    error::{ErrorBody, StoreError},
};

/// Rows returned by an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    One(Row),
    Many(Vec<Row>),
}

impl Data {
    /// Flattens into a list of rows.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Data::One(row) => vec![row],
            Data::Many(rows) => rows,
        }
    }
}

/// An upsert item that was not written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    /// Position of the item in the upsert payload.
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Option<Data>,
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(
        default,
        rename = "partialFailures",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub partial_failures: Vec<PartialFailure>,
}

impl QueryResult {
    /// A successful result carrying `data`.
    pub fn data(data: Option<Data>) -> Self {
        QueryResult { data, ..Default::default() }
    }

    /// A successful result carrying one row, or none.
    pub fn row(row: Option<Row>) -> Self {
        QueryResult::data(row.map(Data::One))
    }

    /// A successful result carrying a list of rows.
    pub fn rows(rows: Vec<Row>) -> Self {
        QueryResult::data(Some(Data::Many(rows)))
    }

    /// A failed result.
    pub fn error(error: impl Into<ErrorBody>) -> Self {
        QueryResult { error: Some(error.into()), ..Default::default() }
    }

    pub fn with_count(mut self, count: Option<u64>) -> Self {
        self.count = count;
        self
    }

    pub fn with_partial_failures(mut self, failures: Vec<PartialFailure>) -> Self {
        self.partial_failures = failures;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` when a singleton read matched no document.
    pub fn is_not_found(&self) -> bool {
        self.error.as_ref().is_some_and(ErrorBody::is_not_found)
    }

    /// The single row of a singleton result, if any.
    pub fn as_row(&self) -> Option<&Row> {
        match &self.data {
            Some(Data::One(row)) => Some(row),
            _ => None,
        }
    }

    /// The rows of a list result, if any.
    pub fn as_rows(&self) -> Option<&[Row]> {
        match &self.data {
            Some(Data::Many(rows)) => Some(rows),
            _ => None,
        }
    }

    /// All returned rows, flattening singleton results. Errors yield no rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.data.map(Data::into_rows).unwrap_or_default()
    }

    /// Converts into a standard `Result`, discarding count and partial failures.
    pub fn into_result(self) -> Result<Option<Data>, ErrorBody> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

impl From<StoreError> for QueryResult {
    fn from(err: StoreError) -> Self {
        QueryResult::error(err)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_in_postgrest_shape() {
        let result = QueryResult::rows(vec![doc! { "id": "a" }]).with_count(Some(3));

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "data": [{ "id": "a" }], "error": null, "count": 3 })
        );
    }

    #[test]
    fn errors_serialize_with_null_data() {
        let result = QueryResult::error(StoreError::NotFound);

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "data": null, "error": { "message": "No document found", "code": "PGRST116" } })
        );
        assert!(result.is_not_found());
    }

    #[test]
    fn partial_failures_are_reported_when_present() {
        let result = QueryResult::rows(vec![]).with_partial_failures(vec![PartialFailure {
            index: 1,
            message: "boom".into(),
        }]);

        assert_eq!(
            serde_json::to_value(&result).unwrap()["partialFailures"],
            json!([{ "index": 1, "message": "boom" }])
        );
    }
}
