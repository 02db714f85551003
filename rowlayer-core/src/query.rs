//! Native query primitives understood by document backends.
//!
//! A [`NativeQuery`] is the flat token list a document store accepts: predicates
//! that all must match, sort keys applied in order, and an optional limit and
//! offset. It is deliberately weaker than the builder API in [`crate::builder`];
//! everything the builder offers beyond these tokens (relationships, upserts,
//! per-document writes) is emulated on top of them.
//!
//! # Building
//!
//! ```ignore
//! use rowlayer::query::{NativeQuery, Predicate, SortDirection};
//!
//! let query = NativeQuery::builder()
//!     .predicate(Predicate::equal("status", "active"))
//!     .sort("$createdAt", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```
//!
//! Backends translate predicates through [`QueryVisitor`].

use bson::{Bson, Document};

use crate::error::StoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Comparison operators of native predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    /// Field equals the value.
    Equal,
    /// Field differs from the value.
    NotEqual,
    /// Field contains every whitespace-separated token of the value as a whole word,
    /// case-insensitively. This is a full-text primitive, not a substring match.
    Search,
    /// Field is greater than the value.
    GreaterThan,
    /// Field is greater than or equal to the value.
    GreaterThanEqual,
    /// Field is less than the value.
    LessThan,
    /// Field is less than or equal to the value.
    LessThanEqual,
    /// Field equals one of the values of an array.
    In,
}

/// A single predicate token.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: PredicateOp,
    pub value: Bson,
}

impl Predicate {
    /// Creates a predicate token.
    pub fn new(field: impl Into<String>, op: PredicateOp, value: impl Into<Bson>) -> Self {
        Predicate { field: field.into(), op, value: value.into() }
    }

    pub fn equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Predicate::new(field, PredicateOp::Equal, value)
    }

    pub fn not_equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Predicate::new(field, PredicateOp::NotEqual, value)
    }

    pub fn search(field: impl Into<String>, text: impl Into<String>) -> Self {
        Predicate::new(field, PredicateOp::Search, Bson::String(text.into()))
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Predicate::new(field, PredicateOp::GreaterThan, value)
    }

    pub fn greater_than_equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Predicate::new(field, PredicateOp::GreaterThanEqual, value)
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Predicate::new(field, PredicateOp::LessThan, value)
    }

    pub fn less_than_equal(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Predicate::new(field, PredicateOp::LessThanEqual, value)
    }

    /// Creates a set-membership predicate.
    pub fn is_in<V>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Bson>,
    {
        Predicate::new(
            field,
            PredicateOp::In,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

/// Splits search text into the lowercase word tokens a full-text index would hold.
pub fn search_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A flat list of native query tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeQuery {
    /// Predicates; a document must match all of them.
    pub predicates: Vec<Predicate>,
    /// Sort keys in priority order.
    pub sorts: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl NativeQuery {
    /// Creates a new empty query with no predicates or limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> NativeQueryBuilder {
        NativeQueryBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NativeQueryBuilder {
    query: NativeQuery,
}

impl NativeQueryBuilder {
    pub fn new() -> Self {
        NativeQueryBuilder { query: NativeQuery::default() }
    }

    /// Appends a predicate.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.query.predicates.push(predicate);
        self
    }

    /// Appends every predicate of `predicates`, keeping their order.
    pub fn predicates(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.query.predicates.extend(predicates);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sorts.push(Sort { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn build(self) -> NativeQuery {
        self.query
    }
}

/// One page of a native listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentList {
    /// Number of documents matching the predicates, ignoring limit and offset.
    pub total: u64,
    /// The returned documents in native envelope shape.
    pub documents: Vec<Document>,
}

/// Translates predicate tokens into a backend's own representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_predicate(
        &mut self,
        field: &str,
        op: PredicateOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    /// Combines the translations of every predicate; all must hold.
    fn visit_all(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error>;

    fn visit(&mut self, predicate: &Predicate) -> Result<Self::Output, Self::Error> {
        self.visit_predicate(&predicate.field, predicate.op, &predicate.value)
    }
}
