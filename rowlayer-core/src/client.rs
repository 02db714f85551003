use std::sync::Arc;

use crate::{
    backend::{DocumentBackend, DynDocumentBackend},
    builder::TableQuery,
    config::ClientConfig,
    error::StoreResult,
    relation::{ConventionStrategy, ForeignKeyStrategy},
};

/// Entry point of the adapter.
///
/// A `Client` owns a backend and the adapter configuration and hands out one
/// [`TableQuery`] per logical query.
///
/// # Example
///
/// ```ignore
/// use rowlayer::prelude::*;
///
/// let client = Client::new(InMemoryStore::builder().build().await?);
///
/// let result = client
///     .from("students")
///     .select_with("*", SelectOptions::exact_count().head(true))
///     .eq("school_id", "sc1")
///     .await;
/// println!("{:?}", result.count);
/// ```
#[derive(Debug)]
pub struct Client<B: DocumentBackend> {
    backend: B,
    config: ClientConfig,
    foreign_keys: Arc<dyn ForeignKeyStrategy>,
}

impl<B: DocumentBackend> Client<B> {
    /// Creates a client with the default configuration.
    pub fn new(backend: B) -> Self {
        Client {
            backend,
            config: ClientConfig::default(),
            foreign_keys: Arc::new(ConventionStrategy),
        }
    }

    /// Creates a client with a validated configuration.
    ///
    /// A configured relation registry becomes the foreign key strategy.
    pub fn with_config(backend: B, config: ClientConfig) -> StoreResult<Self> {
        config.validate()?;

        let foreign_keys: Arc<dyn ForeignKeyStrategy> = match &config.relations {
            Some(registry) => Arc::new(registry.clone()),
            None => Arc::new(ConventionStrategy),
        };

        Ok(Client { backend, config, foreign_keys })
    }

    /// Replaces the foreign key strategy used to embed relations.
    pub fn with_foreign_keys(mut self, strategy: impl ForeignKeyStrategy + 'static) -> Self {
        self.foreign_keys = Arc::new(strategy);
        self
    }

    /// Starts a query against a table.
    #[allow(clippy::should_implement_trait)]
    pub fn from(&self, table: &str) -> TableQuery<'_, B> {
        TableQuery::new(self, table)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn foreign_keys(&self) -> &dyn ForeignKeyStrategy {
        self.foreign_keys.as_ref()
    }

    /// Erases the backend type, for selecting the store at runtime.
    pub fn into_dyn(self) -> Client<DynDocumentBackend>
    where
        B: 'static,
    {
        Client {
            backend: Box::new(self.backend),
            config: self.config,
            foreign_keys: self.foreign_keys,
        }
    }

    /// Shuts the backend down.
    pub async fn shutdown(self) -> StoreResult<()> {
        self.backend.shutdown().await
    }
}
