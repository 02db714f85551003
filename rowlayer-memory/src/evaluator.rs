//! Predicate evaluation for in-memory document filtering.
//!
//! This module evaluates native predicate tokens against documents and
//! orders documents by sort keys, mirroring the matching rules of a document
//! store: scalar comparisons on numbers, strings and dates, any-element
//! matching on array fields, and whole-word full-text search.

use bson::{datetime::DateTime, Bson, Document};
use std::{cmp::Ordering, collections::HashMap};

use rowlayer_core::{
    error::StoreError,
    query::{search_tokens, Predicate, PredicateOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Normalizes every numeric type to f64 so that `Int32(5)` equals `Double(5.0)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats normalized to f64
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    /// Total order used for sorting: nulls first, incomparable values tie.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Null, _) => Ordering::Less,
            (_, Comparable::Null) => Ordering::Greater,
            _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Equality against a field value; array fields match when any element does.
    fn matches(&self, value: &Comparable<'_>) -> bool {
        match self {
            Comparable::Array(items) if !matches!(value, Comparable::Array(_)) => {
                items.iter().any(|item| item == value)
            }
            _ => self == value,
        }
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` when the document satisfies every predicate.
    pub fn evaluate(&mut self, predicates: &[Predicate]) -> Result<bool, StoreError> {
        self.visit_all(predicates)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        predicates: &[Predicate],
    ) -> Result<Vec<&'a Document>, StoreError> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(predicates)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = StoreError;

    fn visit_all(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        for predicate in predicates {
            if !self.visit(predicate)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_predicate(
        &mut self,
        field: &str,
        op: PredicateOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let field_value = self.document.get(field);
        let right = Comparable::from(value);

        // A missing field only satisfies an empty search.
        Ok(match (op, field_value.map(Comparable::from)) {
            (PredicateOp::Search, _) => search(field_value, value)?,
            (_, None) => false,
            (PredicateOp::Equal, Some(left)) => left.matches(&right),
            (PredicateOp::NotEqual, Some(left)) => !left.matches(&right),
            (PredicateOp::In, Some(left)) => match &right {
                Comparable::Array(values) => values.iter().any(|value| left.matches(value)),
                single => left.matches(single),
            },
            (PredicateOp::GreaterThan, Some(left)) => {
                left.partial_cmp(&right) == Some(Ordering::Greater)
            }
            (PredicateOp::GreaterThanEqual, Some(left)) => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            (PredicateOp::LessThan, Some(left)) => left.partial_cmp(&right) == Some(Ordering::Less),
            (PredicateOp::LessThanEqual, Some(left)) => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Less | Ordering::Equal)
            ),
        })
    }
}

// Every query token must appear as a whole word of the field.
fn search(field_value: Option<&Bson>, query: &Bson) -> Result<bool, StoreError> {
    let Some(text) = query.as_str() else {
        return Err(StoreError::InvalidDocument(format!(
            "search text must be a string, got {query}"
        )));
    };

    let wanted = search_tokens(text);
    if wanted.is_empty() {
        return Ok(true);
    }

    let words = match field_value {
        Some(Bson::String(value)) => search_tokens(value),
        Some(Bson::Array(items)) => items
            .iter()
            .filter_map(Bson::as_str)
            .flat_map(search_tokens)
            .collect(),
        _ => return Ok(false),
    };

    Ok(wanted.iter().all(|token| words.contains(token)))
}

/// Orders two documents by the sort keys in priority order.
pub(crate) fn compare_documents(left: &Document, right: &Document, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let a = left.get(&sort.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let b = right.get(&sort.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match sort.direction {
            SortDirection::Asc => a.sort_cmp(&b),
            SortDirection::Desc => b.sort_cmp(&a),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
