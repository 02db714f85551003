//! Execution of a [`TableQuery`] against its backend.
//!
//! Every operation is emulated with the primitive backend calls: reads are one
//! listing (plus one listing per embedded relation), writes touch documents one
//! at a time. Errors propagate internally and are converted into the result
//! envelope in [`TableQuery::execute`] only.

use bson::Document;
use tracing::{debug, error, warn};

use crate::{
    backend::DocumentBackend,
    builder::{Cardinality, Operation, Payload, TableQuery, UpsertOptions},
    document::{
        from_native, is_present, map_field, native_id, supplied_id, to_native_payload, unique_id,
        Row, ID_FIELD,
    },
    error::{StoreError, StoreResult},
    query::{NativeQuery, Predicate, SortDirection},
    relation::embed_relations,
    result::{PartialFailure, QueryResult},
};

impl<'a, B> TableQuery<'a, B>
where
    B: DocumentBackend + 'a,
{
    /// Executes the builder and returns the result envelope.
    ///
    /// Never fails: every error is reported in the envelope's `error` member.
    pub async fn execute(self) -> QueryResult {
        debug!(
            table = %self.table,
            collection = %self.collection,
            operation = self.operation.kind(),
            "executing query"
        );

        match self.run().await {
            Ok(result) => result,
            Err(err) => {
                match &err {
                    StoreError::NotFound => {
                        debug!(collection = %self.collection, "singleton read matched no document");
                    }
                    StoreError::ConflictingPagination(_) | StoreError::InvalidDocument(_) => {
                        warn!(collection = %self.collection, error = %err, "query rejected");
                    }
                    _ => {
                        error!(
                            collection = %self.collection,
                            operation = self.operation.kind(),
                            error = %err,
                            "query failed"
                        );
                    }
                }
                QueryResult::error(err)
            }
        }
    }

    async fn run(&self) -> StoreResult<QueryResult> {
        if let Some(err) = &self.deferred {
            return Err(err.clone());
        }

        match &self.operation {
            Operation::Unset | Operation::Select => self.run_select().await,
            Operation::Insert(payload) => self.run_insert(payload).await,
            Operation::Update(data) => self.run_update(data).await,
            Operation::Delete => self.run_delete().await,
            Operation::Upsert(payload, options) => self.run_upsert(payload, options).await,
        }
    }

    fn backend(&self) -> &B {
        self.client.backend()
    }

    async fn run_select(&self) -> StoreResult<QueryResult> {
        if self.head {
            let query = NativeQuery::builder()
                .predicates(self.predicates.iter().cloned())
                .limit(1)
                .build();
            let list = self.backend().list_documents(&self.collection, &query).await?;

            return Ok(QueryResult::data(None).with_count(self.exact_count.then_some(list.total)));
        }

        let list = self
            .backend()
            .list_documents(&self.collection, &self.native_query())
            .await?;
        let mut rows: Vec<Row> = list.documents.iter().map(from_native).collect();

        embed_relations(
            self.backend(),
            self.client.config(),
            self.client.foreign_keys(),
            &self.table,
            &self.select.relations,
            &mut rows,
        )
        .await;

        let mut rows = rows.into_iter().map(|row| self.select.project(row));

        match self.cardinality {
            Cardinality::Single => rows
                .next()
                .map(|row| QueryResult::row(Some(row)))
                .ok_or(StoreError::NotFound),
            Cardinality::MaybeSingle => Ok(QueryResult::row(rows.next())),
            Cardinality::Many => Ok(QueryResult::rows(rows.collect())
                .with_count(self.exact_count.then_some(list.total))),
        }
    }

    async fn run_insert(&self, payload: &Payload) -> StoreResult<QueryResult> {
        let mut rows = Vec::with_capacity(payload.rows().len());

        for item in payload.rows() {
            rows.push(self.create(item).await?);
        }

        let single = self.cardinality != Cardinality::Many || matches!(payload, Payload::One(_));
        Ok(self.written(rows, single))
    }

    async fn run_update(&self, data: &Row) -> StoreResult<QueryResult> {
        let matched = self.fetch_matching().await?;
        let changes = to_native_payload(data);
        let mut rows = Vec::with_capacity(matched.len());

        for document in &matched {
            let id = document_id(document)?;
            let updated = self
                .backend()
                .update_document(&self.collection, id, changes.clone())
                .await?;
            rows.push(from_native(&updated));
        }

        debug!(collection = %self.collection, updated = rows.len(), "update applied");

        Ok(self.written(rows, self.cardinality != Cardinality::Many))
    }

    async fn run_delete(&self) -> StoreResult<QueryResult> {
        let matched = self.fetch_matching().await?;

        for document in &matched {
            self.backend()
                .delete_document(&self.collection, document_id(document)?)
                .await?;
        }

        debug!(collection = %self.collection, deleted = matched.len(), "delete applied");

        if !self.returning {
            return Ok(QueryResult::data(None));
        }

        let rows = matched.iter().map(from_native).collect();
        Ok(self.written(rows, self.cardinality != Cardinality::Many))
    }

    async fn run_upsert(&self, payload: &Payload, options: &UpsertOptions) -> StoreResult<QueryResult> {
        let conflict_keys = options.conflict_keys();
        let mut rows = Vec::with_capacity(payload.rows().len());
        let mut failures = Vec::new();

        for (index, item) in payload.rows().iter().enumerate() {
            match self.upsert_one(item, &conflict_keys, options.ignore_duplicates).await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        collection = %self.collection,
                        index,
                        error = %err,
                        "upsert item failed, continuing with the rest"
                    );
                    failures.push(PartialFailure { index, message: err.to_string() });
                }
            }
        }

        Ok(self
            .written(rows, self.cardinality != Cardinality::Many)
            .with_partial_failures(failures))
    }

    /// Updates the row matching the conflict keys, or creates it.
    ///
    /// Returns `None` when an existing row was left untouched.
    async fn upsert_one(
        &self,
        item: &Row,
        conflict_keys: &[&str],
        ignore_duplicates: bool,
    ) -> StoreResult<Option<Row>> {
        let has_keys = !conflict_keys.is_empty()
            && conflict_keys.iter().all(|key| is_present(item.get(*key)));

        if has_keys {
            let query = NativeQuery::builder()
                .predicates(conflict_keys.iter().filter_map(|key| {
                    item.get(*key)
                        .map(|value| Predicate::equal(map_field(key), value.clone()))
                }))
                .limit(1)
                .build();
            let existing = self.backend().list_documents(&self.collection, &query).await?;

            if let Some(document) = existing.documents.first() {
                if ignore_duplicates {
                    return Ok(None);
                }

                let mut changes = to_native_payload(item);
                for key in conflict_keys {
                    changes.remove(*key);
                }

                let updated = self
                    .backend()
                    .update_document(&self.collection, document_id(document)?, changes)
                    .await?;
                return Ok(Some(from_native(&updated)));
            }
        }

        self.create(item).await.map(Some)
    }

    async fn create(&self, item: &Row) -> StoreResult<Row> {
        let id = supplied_id(item).unwrap_or_else(unique_id);
        let created = self
            .backend()
            .create_document(&self.collection, &id, to_native_payload(item))
            .await?;

        Ok(from_native(&created))
    }

    /// Lists every document matching the filters, one batch at a time.
    async fn fetch_matching(&self) -> StoreResult<Vec<Document>> {
        let batch_size = self.client.config().batch_size.max(1);
        let mut documents = Vec::new();

        loop {
            let query = NativeQuery::builder()
                .predicates(self.predicates.iter().cloned())
                .sort(ID_FIELD, SortDirection::Asc)
                .limit(batch_size)
                .offset(documents.len())
                .build();
            let page = self.backend().list_documents(&self.collection, &query).await?;
            let received = page.documents.len();
            documents.extend(page.documents);

            if received < batch_size || documents.len() as u64 >= page.total {
                break;
            }
        }

        Ok(documents)
    }

    /// Shapes the rows affected by a write.
    fn written(&self, rows: Vec<Row>, single: bool) -> QueryResult {
        let rows: Vec<Row> = if self.returning {
            rows.into_iter().map(|row| self.select.project(row)).collect()
        } else {
            rows
        };

        if single {
            QueryResult::row(rows.into_iter().next())
        } else {
            QueryResult::rows(rows)
        }
    }
}

fn document_id(document: &Document) -> StoreResult<&str> {
    native_id(document).ok_or_else(|| {
        StoreError::InvalidDocument("backend returned a document without an identifier".into())
    })
}
