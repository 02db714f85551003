//! Adapter configuration.
//!
//! A [`ClientConfig`] tells the adapter how caller table names map onto backend
//! collection identifiers, which foreign keys link collections, and how many
//! documents to fetch per page when an update or delete has to visit every match.
//!
//! Configuration can be built in code, deserialized from JSON, or read from the
//! environment:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `ROWLAYER_COLLECTIONS` | comma-separated `name=collection_id` pairs |
//! | `ROWLAYER_BATCH_SIZE` | documents fetched per page by update/delete |
//! | `ROWLAYER_RELATIONS` | comma-separated `source.related=foreign_key` links |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    error::{StoreError, StoreResult},
    relation::RelationRegistry,
};

/// Default number of documents fetched per page when visiting every match.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Caller table name to backend collection identifier. Names without an entry
    /// are used as identifiers unchanged.
    pub collections: HashMap<String, String>,
    /// Explicit foreign-key links. When absent, keys are guessed from collection names.
    pub relations: Option<RelationRegistry>,
    /// Documents fetched per page by update and delete.
    pub batch_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            collections: HashMap::new(),
            relations: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a caller table name to a backend collection identifier.
    pub fn with_collection(mut self, name: impl Into<String>, collection_id: impl Into<String>) -> Self {
        self.collections.insert(name.into(), collection_id.into());
        self
    }

    pub fn with_relations(mut self, relations: RelationRegistry) -> Self {
        self.relations = Some(relations);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Resolves a caller table name to its backend collection identifier.
    pub fn collection_id<'a>(&'a self, name: &'a str) -> &'a str {
        self.collections
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Checks the configuration for values the adapter cannot work with.
    pub fn validate(&self) -> StoreResult<()> {
        if self.batch_size == 0 {
            return Err(StoreError::Configuration("batch_size must be greater than zero".into()));
        }

        if let Some((name, _)) = self.collections.iter().find(|(_, id)| id.is_empty()) {
            return Err(StoreError::Configuration(format!(
                "collection `{name}` maps to an empty identifier"
            )));
        }

        Ok(())
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;

        Ok(config)
    }

    /// Reads the configuration from `ROWLAYER_*` environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config = ClientConfig::default();

        if let Some(collections) = lookup("ROWLAYER_COLLECTIONS") {
            for (name, id) in parse_pairs("ROWLAYER_COLLECTIONS", &collections)? {
                config.collections.insert(name.to_string(), id.to_string());
            }
        }

        if let Some(batch_size) = lookup("ROWLAYER_BATCH_SIZE") {
            config.batch_size = batch_size.trim().parse().map_err(|_| {
                StoreError::Configuration(format!("ROWLAYER_BATCH_SIZE is not a number: {batch_size}"))
            })?;
        }

        if let Some(relations) = lookup("ROWLAYER_RELATIONS") {
            let mut registry = RelationRegistry::new();
            for (link, foreign_key) in parse_pairs("ROWLAYER_RELATIONS", &relations)? {
                let (source, related) = link.split_once('.').ok_or_else(|| {
                    StoreError::Configuration(format!(
                        "ROWLAYER_RELATIONS entry `{link}` must be written as source.related"
                    ))
                })?;
                registry = registry.link(source.trim(), related.trim(), foreign_key);
            }
            config.relations = Some(registry);
        }

        config.validate()?;

        Ok(config)
    }
}

fn parse_pairs<'a>(variable: &str, value: &'a str) -> StoreResult<Vec<(&'a str, &'a str)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.trim(), value.trim()))
                .ok_or_else(|| {
                    StoreError::Configuration(format!("{variable} entry `{entry}` is missing `=`"))
                })
        })
        .collect()
}
