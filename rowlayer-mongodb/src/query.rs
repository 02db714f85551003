//! Query translation from native predicate tokens to MongoDB query syntax.
//!
//! Field names are translated to their stored form ([`ValueSanitizer::stored_field`]).
//! Full-text search becomes one case-insensitive `$regex` per search token,
//! bounded by Unicode letter/number lookarounds so matching stays whole-word
//! for non-ASCII text too. `\b` is ASCII-only in the server's regex engine.

use bson::{doc, Bson, Document};

use rowlayer_core::{
    error::StoreError,
    query::{search_tokens, Predicate, PredicateOp, QueryVisitor, Sort, SortDirection},
};

use crate::sanitizer::ValueSanitizer;

const WORD_CHAR: &str = r"[\p{L}\p{N}]";

// Matches `token` as a whole word, with words split like `search_tokens` splits them.
fn word_pattern(token: &str) -> String {
    format!("(?<!{WORD_CHAR}){}(?!{WORD_CHAR})", regex::escape(token))
}

/// Translates native predicates into MongoDB filter documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Builds the sort document; keys keep their priority order.
    pub(crate) fn sort_document(sorts: &[Sort]) -> Option<Document> {
        if sorts.is_empty() {
            return None;
        }

        let mut sort = Document::new();
        for key in sorts {
            sort.insert(
                ValueSanitizer::stored_field(&key.field),
                match key.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                },
            );
        }

        Some(sort)
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = StoreError;

    fn visit_all(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        let mut clauses = predicates
            .iter()
            .map(|predicate| self.visit(predicate))
            .filter(|clause| !matches!(clause, Ok(clause) if clause.is_empty()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match clauses.len() {
            0 => doc! {},
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        })
    }

    fn visit_predicate(
        &mut self,
        field: &str,
        op: PredicateOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let field = ValueSanitizer::stored_field(field);

        Ok(match op {
            PredicateOp::Equal => doc! { field: { "$eq": value } },
            PredicateOp::NotEqual => doc! { field: { "$ne": value, "$exists": true } },
            PredicateOp::GreaterThan => doc! { field: { "$gt": value } },
            PredicateOp::GreaterThanEqual => doc! { field: { "$gte": value } },
            PredicateOp::LessThan => doc! { field: { "$lt": value } },
            PredicateOp::LessThanEqual => doc! { field: { "$lte": value } },
            PredicateOp::In => match value {
                Bson::Array(values) => doc! { field: { "$in": values } },
                single => doc! { field: { "$in": [single] } },
            },
            PredicateOp::Search => {
                let text = value.as_str().ok_or_else(|| {
                    StoreError::InvalidDocument(format!("search text must be a string, got {value}"))
                })?;

                let mut clauses = search_tokens(text)
                    .iter()
                    .map(|token| doc! {
                        field.as_str(): {
                            "$regex": word_pattern(token),
                            "$options": "i",
                        }
                    })
                    .collect::<Vec<_>>();

                match clauses.len() {
                    0 => doc! {},
                    1 => clauses.remove(0),
                    _ => doc! { "$and": clauses },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(predicates: &[Predicate]) -> Document {
        MongoQueryTranslator.visit_all(predicates).unwrap()
    }

    #[test]
    fn identifiers_and_envelope_fields_use_stored_names() {
        assert_eq!(
            translate(&[Predicate::is_in("$id", ["a", "b"])]),
            doc! { "_id": { "$in": ["a", "b"] } }
        );
        assert_eq!(
            translate(&[Predicate::greater_than_equal("$createdAt", "2024-01-01")]),
            doc! { "__dollar__createdAt": { "$gte": "2024-01-01" } }
        );
    }

    #[test]
    fn multiple_predicates_are_anded() {
        assert_eq!(
            translate(&[Predicate::equal("status", "active"), Predicate::not_equal("city", "Lund")]),
            doc! {
                "$and": [
                    { "status": { "$eq": "active" } },
                    { "city": { "$ne": "Lund", "$exists": true } },
                ]
            }
        );
        assert_eq!(translate(&[]), doc! {});
    }

    #[test]
    fn search_becomes_word_bounded_regexes() {
        assert_eq!(
            translate(&[Predicate::search("name", "Stock exchange")]),
            doc! {
                "$and": [
                    { "name": { "$regex": r"(?<![\p{L}\p{N}])stock(?![\p{L}\p{N}])", "$options": "i" } },
                    { "name": { "$regex": r"(?<![\p{L}\p{N}])exchange(?![\p{L}\p{N}])", "$options": "i" } },
                ]
            }
        );
    }

    #[test]
    fn search_bounds_words_ending_in_non_ascii_letters() {
        let filter = translate(&[Predicate::search("city", "Malmö")]);
        let pattern = filter.get_document("city").unwrap().get_str("$regex").unwrap();

        assert_eq!(pattern, r"(?<![\p{L}\p{N}])malmö(?![\p{L}\p{N}])");
        assert!(!pattern.contains(r"\b"));
    }

    #[test]
    fn empty_search_matches_everything() {
        assert_eq!(translate(&[Predicate::search("name", "")]), doc! {});
        assert_eq!(
            translate(&[Predicate::search("name", ""), Predicate::equal("a", 1)]),
            doc! { "a": { "$eq": 1 } }
        );
    }

    #[test]
    fn sorts_keep_priority_order() {
        let sort = MongoQueryTranslator::sort_document(&[
            Sort { field: "$createdAt".into(), direction: SortDirection::Desc },
            Sort { field: "name".into(), direction: SortDirection::Asc },
        ])
        .unwrap();

        assert_eq!(sort, doc! { "__dollar__createdAt": -1, "name": 1 });
        assert_eq!(sort.keys().next().map(String::as_str), Some("__dollar__createdAt"));
        assert!(MongoQueryTranslator::sort_document(&[]).is_none());
    }
}
