//! The chainable table query builder.
//!
//! A [`TableQuery`] is created by [`Client::from`](crate::client::Client::from)
//! and accumulates filters, ordering, pagination and an operation by value:
//! every chain call consumes the builder and returns it. Executing it (through
//! [`TableQuery::execute`], [`TableQuery::single`], [`TableQuery::maybe_single`]
//! or `.await`) consumes it as well, so a builder runs at most once.
//!
//! ```ignore
//! let result = client
//!     .from("students")
//!     .select("*, schools(name)")
//!     .eq("status", "active")
//!     .ilike("city", "%stock%")
//!     .order("created_at", false)
//!     .range(0, 9)
//!     .await;
//! ```
//!
//! Chain calls never fail. Problems detected while chaining, such as an
//! unparsable select list or mixing `range` with `limit`, are reported in the
//! result envelope when the builder executes.

use bson::Bson;
use futures::future::BoxFuture;
use std::future::IntoFuture;

use crate::{
    backend::DocumentBackend,
    client::Client,
    document::{map_field, map_sort_field, Row},
    error::{StoreError, StoreResult},
    page::{Pagination, PaginationParams},
    query::{NativeQuery, Predicate, Sort, SortDirection},
    result::QueryResult,
    select::SelectSpec,
};

/// Rows handed to `insert` or `upsert`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single row; inserts return a single row.
    One(Row),
    /// An explicit list of rows; inserts return a list.
    Many(Vec<Row>),
}

impl Payload {
    pub fn rows(&self) -> &[Row] {
        match self {
            Payload::One(row) => std::slice::from_ref(row),
            Payload::Many(rows) => rows,
        }
    }
}

impl From<Row> for Payload {
    fn from(row: Row) -> Self {
        Payload::One(row)
    }
}

impl From<Vec<Row>> for Payload {
    fn from(rows: Vec<Row>) -> Self {
        Payload::Many(rows)
    }
}

/// Options of `select_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Attach the exact number of matching documents as `count`.
    pub exact_count: bool,
    /// Return no rows, only the count.
    pub head: bool,
}

impl SelectOptions {
    /// Requests an exact count alongside the rows.
    pub fn exact_count() -> Self {
        SelectOptions { exact_count: true, head: false }
    }

    pub fn head(mut self, head: bool) -> Self {
        self.head = head;
        self
    }
}

/// Options of `upsert`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Comma-separated field names identifying an existing row.
    pub on_conflict: Option<String>,
    /// Leave existing rows untouched instead of updating them.
    pub ignore_duplicates: bool,
}

impl UpsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_conflict(mut self, keys: impl Into<String>) -> Self {
        self.on_conflict = Some(keys.into());
        self
    }

    pub fn ignore_duplicates(mut self, ignore: bool) -> Self {
        self.ignore_duplicates = ignore;
        self
    }

    /// The individual conflict key fields.
    pub fn conflict_keys(&self) -> Vec<&str> {
        self.on_conflict
            .as_deref()
            .map(|keys| {
                keys.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The operation a builder will run.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Operation {
    /// Nothing chosen yet; executes as a read.
    #[default]
    Unset,
    Select,
    Insert(Payload),
    Update(Row),
    Delete,
    Upsert(Payload, UpsertOptions),
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Unset | Operation::Select => "select",
            Operation::Insert(_) => "insert",
            Operation::Update(_) => "update",
            Operation::Delete => "delete",
            Operation::Upsert(..) => "upsert",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Unset | Operation::Select)
    }
}

/// How many rows the caller expects back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cardinality {
    #[default]
    Many,
    /// Exactly one; a read matching nothing is an error.
    Single,
    /// At most one; a read matching nothing yields null data.
    MaybeSingle,
}

/// Accepted by `select`: a wire-format select list or an already typed spec.
pub trait IntoSelectSpec {
    fn into_select_spec(self) -> StoreResult<SelectSpec>;
}

impl IntoSelectSpec for SelectSpec {
    fn into_select_spec(self) -> StoreResult<SelectSpec> {
        Ok(self)
    }
}

impl IntoSelectSpec for &str {
    fn into_select_spec(self) -> StoreResult<SelectSpec> {
        SelectSpec::parse(self)
    }
}

impl IntoSelectSpec for String {
    fn into_select_spec(self) -> StoreResult<SelectSpec> {
        SelectSpec::parse(&self)
    }
}

impl IntoSelectSpec for &String {
    fn into_select_spec(self) -> StoreResult<SelectSpec> {
        SelectSpec::parse(self)
    }
}

/// A query against one table, executed once.
#[derive(Debug)]
pub struct TableQuery<'a, B: DocumentBackend> {
    pub(crate) client: &'a Client<B>,
    pub(crate) table: String,
    pub(crate) collection: String,
    pub(crate) operation: Operation,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) sorts: Vec<Sort>,
    pub(crate) pagination: Pagination,
    pub(crate) select: SelectSpec,
    pub(crate) returning: bool,
    pub(crate) exact_count: bool,
    pub(crate) head: bool,
    pub(crate) cardinality: Cardinality,
    pub(crate) deferred: Option<StoreError>,
}

impl<B: DocumentBackend> Clone for TableQuery<'_, B> {
    fn clone(&self) -> Self {
        TableQuery {
            client: self.client,
            table: self.table.clone(),
            collection: self.collection.clone(),
            operation: self.operation.clone(),
            predicates: self.predicates.clone(),
            sorts: self.sorts.clone(),
            pagination: self.pagination,
            select: self.select.clone(),
            returning: self.returning,
            exact_count: self.exact_count,
            head: self.head,
            cardinality: self.cardinality,
            deferred: self.deferred.clone(),
        }
    }
}

impl<'a, B: DocumentBackend> TableQuery<'a, B> {
    pub(crate) fn new(client: &'a Client<B>, table: &str) -> Self {
        TableQuery {
            client,
            table: table.to_string(),
            collection: client.config().collection_id(table).to_string(),
            operation: Operation::Unset,
            predicates: Vec::new(),
            sorts: Vec::new(),
            pagination: Pagination::Unset,
            select: SelectSpec::all(),
            returning: false,
            exact_count: false,
            head: false,
            cardinality: Cardinality::Many,
            deferred: None,
        }
    }

    /// The table name the builder was created for.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The backend collection the table name resolved to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The native query a read with the accumulated state sends to the backend.
    pub fn native_query(&self) -> NativeQuery {
        NativeQuery {
            predicates: self.predicates.clone(),
            sorts: self.sorts.clone(),
            limit: self.pagination.limit(),
            offset: self.pagination.offset(),
        }
    }

    // Keeps the first problem found while chaining.
    fn defer(&mut self, err: StoreError) {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    /// Selects columns and relations.
    ///
    /// Without a write operation this makes the builder a read. After `insert`,
    /// `update`, `upsert` or `delete` it asks for the affected rows instead.
    pub fn select(self, spec: impl IntoSelectSpec) -> Self {
        self.select_with(spec, SelectOptions::default())
    }

    /// Like [`select`](Self::select), with count and head options.
    pub fn select_with(mut self, spec: impl IntoSelectSpec, options: SelectOptions) -> Self {
        match spec.into_select_spec() {
            Ok(spec) => self.select = spec,
            Err(err) => self.defer(err),
        }

        self.exact_count = options.exact_count;
        self.head = options.head;

        if self.operation.is_write() {
            self.returning = true;
        } else {
            self.operation = Operation::Select;
        }

        self
    }

    fn write(mut self, operation: Operation) -> Self {
        if self.operation == Operation::Select {
            self.returning = true;
        }
        self.operation = operation;
        self
    }

    /// Inserts one row, or every row of a list.
    pub fn insert(self, payload: impl Into<Payload>) -> Self {
        self.write(Operation::Insert(payload.into()))
    }

    /// Applies `data` to every row matching the filters.
    pub fn update(self, data: Row) -> Self {
        self.write(Operation::Update(data))
    }

    /// Deletes every row matching the filters.
    pub fn delete(self) -> Self {
        self.write(Operation::Delete)
    }

    /// Inserts rows, updating the existing row when the conflict keys match one.
    pub fn upsert(self, payload: impl Into<Payload>, options: UpsertOptions) -> Self {
        self.write(Operation::Upsert(payload.into(), options))
    }

    fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Bson>) -> Self {
        self.filter(Predicate::equal(map_field(field), value))
    }

    pub fn neq(self, field: &str, value: impl Into<Bson>) -> Self {
        self.filter(Predicate::not_equal(map_field(field), value))
    }

    /// Case-insensitive pattern match, translated to a full-text search.
    ///
    /// `%` wildcards are stripped and the remaining words must each appear as a
    /// whole word in the field. `"%stock%"` therefore matches `"Stock Exchange"`
    /// but not `"Stockholm"`. An empty pattern matches every row.
    pub fn ilike(self, field: &str, pattern: &str) -> Self {
        let text = pattern.replace('%', "");
        self.filter(Predicate::search(field, text))
    }

    pub fn gt(self, field: &str, value: impl Into<Bson>) -> Self {
        self.filter(Predicate::greater_than(field, value))
    }

    pub fn gte(self, field: &str, value: impl Into<Bson>) -> Self {
        self.filter(Predicate::greater_than_equal(field, value))
    }

    pub fn lt(self, field: &str, value: impl Into<Bson>) -> Self {
        self.filter(Predicate::less_than(field, value))
    }

    pub fn lte(self, field: &str, value: impl Into<Bson>) -> Self {
        self.filter(Predicate::less_than_equal(field, value))
    }

    /// Matches rows whose field equals any of `values`.
    pub fn in_<V>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Bson>,
    {
        self.filter(Predicate::is_in(map_field(field), values))
    }

    fn paginate_with(mut self, next: Pagination) -> Self {
        match self.pagination.merge(next) {
            Ok(pagination) => self.pagination = pagination,
            Err(err) => self.defer(err),
        }
        self
    }

    /// Returns rows `start..=end` (zero-based, inclusive).
    pub fn range(self, start: usize, end: usize) -> Self {
        self.paginate_with(Pagination::range(start, end))
    }

    pub fn limit(self, limit: usize) -> Self {
        self.paginate_with(Pagination::Limit(limit))
    }

    /// Returns one page of rows; shorthand for the equivalent `range`.
    pub fn paginate(self, params: &PaginationParams) -> Self {
        let (start, end) = params.range();
        self.range(start, end)
    }

    /// Adds a sort key. Earlier calls take priority over later ones.
    pub fn order(mut self, field: &str, ascending: bool) -> Self {
        let direction = if ascending { SortDirection::Asc } else { SortDirection::Desc };
        self.sorts.push(Sort { field: map_sort_field(field).to_string(), direction });
        self
    }

    /// Executes expecting exactly one row.
    ///
    /// A read that matches nothing resolves to a not-found error.
    pub async fn single(mut self) -> QueryResult {
        self.cardinality = Cardinality::Single;
        self.execute().await
    }

    /// Executes expecting at most one row.
    pub async fn maybe_single(mut self) -> QueryResult {
        self.cardinality = Cardinality::MaybeSingle;
        self.execute().await
    }
}

impl<'a, B> IntoFuture for TableQuery<'a, B>
where
    B: DocumentBackend + 'a,
{
    type Output = QueryResult;
    type IntoFuture = BoxFuture<'a, QueryResult>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bson::{doc, Document};

    use super::*;
    use crate::{
        error::StoreResult,
        query::{DocumentList, PredicateOp},
    };

    #[derive(Debug)]
    struct NullBackend;

    #[async_trait]
    impl DocumentBackend for NullBackend {
        async fn list_documents(&self, _: &str, _: &NativeQuery) -> StoreResult<DocumentList> {
            Ok(DocumentList::default())
        }

        async fn create_document(&self, _: &str, _: &str, data: Document) -> StoreResult<Document> {
            Ok(data)
        }

        async fn update_document(&self, _: &str, _: &str, data: Document) -> StoreResult<Document> {
            Ok(data)
        }

        async fn delete_document(&self, _: &str, _: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn filters_map_the_identifier_and_keep_order() {
        let client = Client::new(NullBackend);
        let query = client
            .from("students")
            .eq("id", "s1")
            .eq("status", "active")
            .eq("status", "active")
            .in_("id", ["a", "b"])
            .native_query();

        assert_eq!(
            query.predicates,
            vec![
                Predicate::equal("$id", "s1"),
                Predicate::equal("status", "active"),
                Predicate::equal("status", "active"),
                Predicate::is_in("$id", ["a", "b"]),
            ]
        );
    }

    #[test]
    fn ilike_strips_wildcards_into_a_search() {
        let client = Client::new(NullBackend);
        let query = client.from("companies").ilike("city", "%Stock%holm%").native_query();

        assert_eq!(query.predicates[0].op, PredicateOp::Search);
        assert_eq!(query.predicates[0].value, Bson::String("Stockholm".into()));
    }

    #[test]
    fn range_translates_to_offset_and_limit() {
        let client = Client::new(NullBackend);
        let query = client.from("students").range(0, 9).native_query();
        assert_eq!((query.offset, query.limit), (Some(0), Some(10)));

        let query = client.from("students").paginate(&PaginationParams::new(3, 20)).native_query();
        assert_eq!((query.offset, query.limit), (Some(40), Some(20)));
    }

    #[test]
    fn order_appends_sort_keys() {
        let client = Client::new(NullBackend);
        let query = client
            .from("students")
            .order("last_name", true)
            .order("created_at", false)
            .native_query();

        assert_eq!(
            query.sorts,
            vec![
                Sort { field: "last_name".into(), direction: SortDirection::Asc },
                Sort { field: "$createdAt".into(), direction: SortDirection::Desc },
            ]
        );
    }

    #[test]
    fn select_after_a_write_asks_for_rows() {
        let client = Client::new(NullBackend);

        let read = client.from("students").select("*");
        assert_eq!(read.operation(), &Operation::Select);
        assert!(!read.returning);

        let delete = client.from("students").delete().select("*");
        assert_eq!(delete.operation(), &Operation::Delete);
        assert!(delete.returning);

        let insert = client.from("students").select("id").insert(doc! { "name": "a" });
        assert_eq!(insert.operation().kind(), "insert");
        assert!(insert.returning);
    }

    #[test]
    fn chaining_problems_are_deferred() {
        let client = Client::new(NullBackend);

        let query = client.from("students").range(0, 9).limit(5);
        assert!(matches!(query.deferred, Some(StoreError::ConflictingPagination(_))));

        let query = client.from("students").select("*, schools(name");
        assert!(matches!(query.deferred, Some(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn builders_clone_by_value() {
        let client = Client::new(NullBackend);
        let base = client.from("students").eq("status", "active");
        let narrowed = base.clone().eq("city", "Lund");

        assert_eq!(base.native_query().predicates.len(), 1);
        assert_eq!(narrowed.native_query().predicates.len(), 2);
    }

    #[test]
    fn conflict_keys_split_on_commas() {
        let options = UpsertOptions::new().on_conflict("internship_id, student_id,date");
        assert_eq!(options.conflict_keys(), vec!["internship_id", "student_id", "date"]);
        assert!(UpsertOptions::new().conflict_keys().is_empty());
    }
}
