//! Typed selection specifications.
//!
//! A [`SelectSpec`] names the scalar columns a read returns and the related
//! collections to embed. Callers can build one directly, or pass the textual
//! PostgREST form (`"*, schools(name)"`) which is parsed once at the
//! [`TableQuery::select`](crate::builder::TableQuery::select) boundary.
//!
//! Grammar of the textual form (whitespace is ignored around items):
//!
//! ```text
//! list     := item ("," item)*
//! item     := "*" | column | relation
//! relation := [alias ":"] name ["!" hint] "(" list ")"
//! ```
//!
//! Hints such as `!inner` are accepted and ignored. Nested relations inside a
//! relation's field list are kept as plain field names.

use bson::{Bson, Document};
use std::str::FromStr;

use crate::{
    document::Row,
    error::StoreError,
};

/// Wildcard column.
pub const ALL_COLUMNS: &str = "*";

/// A related collection embedded into each returned row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Name of the related collection as written by the caller.
    pub name: String,
    /// Key the related row is attached under; defaults to `name`.
    pub alias: Option<String>,
    /// Fields of the related row to keep. Empty or `*` keeps every field.
    pub fields: Vec<String>,
}

impl Relation {
    pub fn new<S>(name: impl Into<String>, fields: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        Relation {
            name: name.into(),
            alias: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The key the related row is attached under.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Keeps the requested fields of a related row.
    pub fn project(&self, row: Row) -> Row {
        project_columns(row, &self.fields)
    }
}

/// Scalar columns plus relationships requested by a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectSpec {
    pub columns: Vec<String>,
    pub relations: Vec<Relation>,
}

impl Default for SelectSpec {
    fn default() -> Self {
        SelectSpec::all()
    }
}

impl SelectSpec {
    /// Selects every column and no relationships.
    pub fn all() -> Self {
        SelectSpec { columns: vec![ALL_COLUMNS.to_string()], relations: Vec::new() }
    }

    /// Selects the given columns and no relationships.
    pub fn columns<S>(columns: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        SelectSpec {
            columns: columns.into_iter().map(Into::into).collect(),
            relations: Vec::new(),
        }
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Returns `true` when rows must not be narrowed to specific columns.
    pub fn selects_all(&self) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|c| c == ALL_COLUMNS)
    }

    /// Narrows a primary row to the selected columns, keeping relation keys.
    pub fn project(&self, mut row: Row) -> Row {
        if self.selects_all() {
            return row;
        }

        let mut projected = keep_fields(&mut row, self.columns.iter().map(String::as_str));
        for relation in &self.relations {
            if let Some(value) = row.remove(relation.key()) {
                projected.insert(relation.key(), value);
            }
        }

        projected
    }

    /// Parses the textual PostgREST form.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let mut spec = SelectSpec { columns: Vec::new(), relations: Vec::new() };

        for item in split_top_level(input)? {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }

            match item.find('(') {
                Some(open) => {
                    if !item.ends_with(')') {
                        return Err(StoreError::InvalidDocument(format!(
                            "unterminated relation in select list: {item}"
                        )));
                    }
                    let head = item[..open].trim();
                    let inner = &item[open + 1..item.len() - 1];
                    spec.relations.push(parse_relation(head, inner)?);
                }
                None => spec.columns.push(item.to_string()),
            }
        }

        if spec.columns.is_empty() && spec.relations.is_empty() {
            spec.columns.push(ALL_COLUMNS.to_string());
        }

        Ok(spec)
    }
}

impl FromStr for SelectSpec {
    type Err = StoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        SelectSpec::parse(input)
    }
}

fn parse_relation(head: &str, inner: &str) -> Result<Relation, StoreError> {
    let (alias, target) = match head.split_once(':') {
        Some((alias, target)) => (Some(alias.trim().to_string()), target.trim()),
        None => (None, head),
    };
    let name = target
        .split_once('!')
        .map_or(target, |(name, _hint)| name)
        .trim();

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidDocument(format!(
            "invalid relation name in select list: {head}"
        )));
    }

    let fields = split_top_level(inner)?
        .into_iter()
        .map(|field| match field.find('(') {
            Some(open) => field[..open].trim().to_string(),
            None => field.trim().to_string(),
        })
        .filter(|field| !field.is_empty())
        .collect();

    Ok(Relation { name: name.to_string(), alias, fields })
}

/// Splits on commas that are not nested inside parentheses.
fn split_top_level(input: &str) -> Result<Vec<&str>, StoreError> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (index, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    StoreError::InvalidDocument(format!("unbalanced ')' in select list: {input}"))
                })?;
            }
            ',' if depth == 0 => {
                items.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(StoreError::InvalidDocument(format!(
            "unbalanced '(' in select list: {input}"
        )));
    }

    items.push(&input[start..]);
    Ok(items)
}

/// Keeps `fields` of a row; an empty list or `*` keeps the row unchanged.
pub fn project_columns(mut row: Row, fields: &[String]) -> Row {
    if fields.is_empty() || fields.iter().any(|f| f == ALL_COLUMNS) {
        return row;
    }

    keep_fields(&mut row, fields.iter().map(String::as_str))
}

// Requested columns missing from a schemaless document come back as null.
fn keep_fields<'a>(row: &mut Row, fields: impl IntoIterator<Item = &'a str>) -> Row {
    let mut projected = Document::new();

    for field in fields {
        let value = row.remove(field).unwrap_or(Bson::Null);
        projected.insert(field, value);
    }

    projected
}
