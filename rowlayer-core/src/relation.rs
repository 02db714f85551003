//! Relationship embedding.
//!
//! Document stores have no joins. A select list such as `"*, companies(name)"`
//! is emulated after the primary read: for every requested relation the adapter
//! works out which field of the primary rows references the related collection,
//! fetches all referenced documents with one `$id IN (...)` listing, and attaches
//! the matching related row (or null) to each primary row.
//!
//! Which field is the foreign key is decided by a [`ForeignKeyStrategy`]. The
//! default [`ConventionStrategy`] guesses from the related collection's name;
//! a [`RelationRegistry`] declares links explicitly.

use bson::{Bson, Document};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
};
use tracing::{debug, warn};

use crate::{
    backend::DocumentBackend,
    config::ClientConfig,
    document::{from_native, is_present, native_id, Row, ID_FIELD},
    error::StoreResult,
    query::{NativeQuery, Predicate},
    select::Relation,
};

/// Decides which field of a source collection references a related collection.
pub trait ForeignKeyStrategy: Send + Sync + Debug {
    /// Returns the foreign key field on `rows` of `source` that references `related`.
    ///
    /// Returning `None` skips the relation: its key is left absent on every row.
    fn foreign_key(&self, source: &str, related: &str, rows: &[Row]) -> Option<String>;
}

/// Guesses foreign keys from collection names.
///
/// Singular forms of the related name come first (`companies` tries
/// `company_id`, `schools` tries `school_id`), then the unmodified name
/// (`companies_id`). The first candidate present on any row wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionStrategy;

impl ConventionStrategy {
    /// Candidate foreign key fields for a related collection, in priority order.
    pub fn candidates(related: &str) -> Vec<String> {
        let mut stems = Vec::with_capacity(4);

        if let Some(stem) = related.strip_suffix("ies") {
            stems.push(format!("{stem}y"));
        }
        if let Some(stem) = related.strip_suffix('s') {
            stems.push(stem.to_string());
        }
        if let Some(stem) = related.strip_suffix("es") {
            stems.push(stem.to_string());
        }
        stems.push(related.to_string());

        let mut candidates: Vec<String> = Vec::with_capacity(stems.len());
        for stem in stems.into_iter().filter(|stem| !stem.is_empty()) {
            let candidate = format!("{stem}_id");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        candidates
    }
}

impl ForeignKeyStrategy for ConventionStrategy {
    fn foreign_key(&self, _source: &str, related: &str, rows: &[Row]) -> Option<String> {
        Self::candidates(related)
            .into_iter()
            .find(|candidate| rows.iter().any(|row| row.contains_key(candidate)))
    }
}

/// Explicit foreign key declarations, keyed by source then related collection.
///
/// ```ignore
/// use rowlayer::relation::RelationRegistry;
///
/// let registry = RelationRegistry::new()
///     .link("matches", "companies", "employer_id")
///     .with_convention_fallback(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationRegistry {
    links: HashMap<String, HashMap<String, String>>,
    /// Falls back to [`ConventionStrategy`] for undeclared pairs.
    fallback_to_convention: bool,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `foreign_key` on `source` references `related`.
    pub fn link(
        mut self,
        source: impl Into<String>,
        related: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.links
            .entry(source.into())
            .or_default()
            .insert(related.into(), foreign_key.into());
        self
    }

    pub fn with_convention_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_convention = enabled;
        self
    }

    /// The declared foreign key for a pair, if any.
    pub fn registered_key(&self, source: &str, related: &str) -> Option<&str> {
        self.links
            .get(source)
            .and_then(|related_keys| related_keys.get(related))
            .map(String::as_str)
    }
}

impl ForeignKeyStrategy for RelationRegistry {
    fn foreign_key(&self, source: &str, related: &str, rows: &[Row]) -> Option<String> {
        match self.registered_key(source, related) {
            Some(key) => rows
                .iter()
                .any(|row| row.contains_key(key))
                .then(|| key.to_string()),
            None if self.fallback_to_convention => {
                ConventionStrategy.foreign_key(source, related, rows)
            }
            None => None,
        }
    }
}

/// Outcome of looking up one relation.
struct Lookup<'r> {
    relation: &'r Relation,
    foreign_key: String,
    // `None` when the lookup failed; every row then gets null.
    related: Option<HashMap<String, Row>>,
}

/// Attaches every requested relation to `rows`.
///
/// Relations are looked up concurrently. A failed lookup never fails the
/// primary read: the affected relation is attached as null and a warning is
/// logged.
pub(crate) async fn embed_relations<B>(
    backend: &B,
    config: &ClientConfig,
    foreign_keys: &dyn ForeignKeyStrategy,
    source: &str,
    relations: &[Relation],
    rows: &mut [Row],
) where
    B: DocumentBackend + ?Sized,
{
    if rows.is_empty() || relations.is_empty() {
        return;
    }

    let lookups = {
        let rows: &[Row] = rows;
        join_all(relations.iter().filter_map(|relation| {
            let Some(foreign_key) = foreign_keys.foreign_key(source, &relation.name, rows) else {
                debug!(source, relation = %relation.name, "no foreign key found, skipping relation");
                return None;
            };

            Some(async move {
                let ids = referenced_ids(rows, &foreign_key);
                let related = match lookup_related(backend, config, relation, ids).await {
                    Ok(related) => Some(related),
                    Err(err) => {
                        warn!(
                            source,
                            relation = %relation.name,
                            foreign_key = %foreign_key,
                            error = %err,
                            "relation lookup failed, attaching null"
                        );
                        None
                    }
                };

                Lookup { relation, foreign_key, related }
            })
        }))
        .await
    };

    for lookup in lookups {
        for row in rows.iter_mut() {
            let value = lookup
                .related
                .as_ref()
                .zip(row.get(&lookup.foreign_key).and_then(reference_key))
                .and_then(|(related, id)| related.get(&id))
                .map(|related_row| Bson::Document(related_row.clone()))
                .unwrap_or(Bson::Null);

            row.insert(lookup.relation.key(), value);
        }
    }
}

async fn lookup_related<B>(
    backend: &B,
    config: &ClientConfig,
    relation: &Relation,
    ids: Vec<String>,
) -> StoreResult<HashMap<String, Row>>
where
    B: DocumentBackend + ?Sized,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let collection = config.collection_id(&relation.name);
    let query = NativeQuery::builder()
        .limit(ids.len())
        .predicate(Predicate::is_in(ID_FIELD, ids))
        .build();
    let list = backend.list_documents(collection, &query).await?;

    Ok(list
        .documents
        .iter()
        .filter_map(|document: &Document| {
            let id = native_id(document)?.to_string();
            Some((id, relation.project(from_native(document))))
        })
        .collect())
}

/// Distinct, present foreign key values in first-seen order.
fn referenced_ids(rows: &[Row], foreign_key: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    rows.iter()
        .map(|row| row.get(foreign_key))
        .filter(|value| is_present(*value))
        .filter_map(|value| value.and_then(reference_key))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn reference_key(value: &Bson) -> Option<String> {
    match value {
        Bson::String(id) if !id.is_empty() => Some(id.clone()),
        Bson::Int32(id) => Some(id.to_string()),
        Bson::Int64(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn convention_prefers_singular_names() {
        assert_eq!(ConventionStrategy::candidates("schools"), vec!["school_id", "schools_id"]);
        assert_eq!(
            ConventionStrategy::candidates("companies"),
            vec!["company_id", "companie_id", "compani_id", "companies_id"]
        );
        assert_eq!(ConventionStrategy::candidates("staff"), vec!["staff_id"]);
    }

    #[test]
    fn convention_picks_first_key_present_on_any_row() {
        let rows = vec![doc! { "name": "a" }, doc! { "companies_id": "c1", "company_id": "c2" }];

        assert_eq!(
            ConventionStrategy.foreign_key("matches", "companies", &rows),
            Some("company_id".to_string())
        );
        assert_eq!(
            ConventionStrategy.foreign_key("matches", "schools", &rows),
            None
        );
    }

    #[test]
    fn convention_falls_back_to_plural_key() {
        let rows = vec![doc! { "schools_id": "sc1" }];
        assert_eq!(
            ConventionStrategy.foreign_key("students", "schools", &rows),
            Some("schools_id".to_string())
        );
    }

    #[test]
    fn registry_uses_declared_keys_only() {
        let rows = vec![doc! { "employer_id": "c1", "company_id": "c2" }];
        let registry = RelationRegistry::new().link("matches", "companies", "employer_id");

        assert_eq!(
            registry.foreign_key("matches", "companies", &rows),
            Some("employer_id".to_string())
        );
        assert_eq!(registry.foreign_key("students", "companies", &rows), None);

        let fallback = registry.with_convention_fallback(true);
        assert_eq!(
            fallback.foreign_key("students", "companies", &rows),
            Some("company_id".to_string())
        );
    }

    #[test]
    fn registry_skips_keys_missing_from_rows() {
        let rows = vec![doc! { "company_id": "c1" }];
        let registry = RelationRegistry::new().link("matches", "companies", "employer_id");

        assert_eq!(registry.foreign_key("matches", "companies", &rows), None);
    }

    #[test]
    fn referenced_ids_are_distinct_and_present() {
        let rows = vec![
            doc! { "school_id": "a" },
            doc! { "school_id": "" },
            doc! { "school_id": Bson::Null },
            doc! { "school_id": "a" },
            doc! { "school_id": "b" },
            doc! { "name": "no key" },
        ];

        assert_eq!(referenced_ids(&rows, "school_id"), vec!["a", "b"]);
    }
}
