//! The storage collaborator.
//!
//! The engine never talks to a database directly. It opens one
//! [`Transaction`] per invocation through a [`Store`] and runs every
//! subject fetch, permission read and outcome CRUD call against it, so a
//! permission decision taken early stays valid for the rest of the
//! invocation and a failure rolls back every earlier write.
//!
//! ```text
//! Store::begin() -> Box<dyn Transaction>
//!        |
//!        +-- PermissionLookup (table / row / action permission)
//!        +-- create / read_list / read_one / update / delete
//!        +-- commit | rollback
//! ```

use actuate_auth::ResourcePermission;
use actuate_hook::PermissionLookup;
use actuate_types::{ReferenceId, Row, StoreError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Opens transactions.
pub trait Store: Send + Sync {
    /// Starts a transaction with a consistent view of the data.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend is unavailable.
    fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// One consistent unit of work.
///
/// Implementations read and write their own snapshot; nothing is visible
/// to other transactions until [`commit`](Self::commit).
pub trait Transaction: PermissionLookup + Send {
    /// This transaction as a permission lookup.
    fn as_lookup(&self) -> &dyn PermissionLookup;

    /// Inserts a row and returns it as stored.
    fn create(&mut self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Lists rows matching the query.
    fn read_list(&self, query: &ListQuery) -> Result<Vec<Row>, StoreError>;

    /// Fetches one row.
    fn read_one(&self, table: &str, id: ReferenceId) -> Result<Row, StoreError>;

    /// Applies `changes` to a row and returns the updated row.
    fn update(&mut self, table: &str, id: ReferenceId, changes: Row) -> Result<Row, StoreError>;

    /// Removes a row.
    fn delete(&mut self, table: &str, id: ReferenceId) -> Result<(), StoreError>;

    /// Permission record of the action `name` declared on `table`.
    fn action_permission(&self, table: &str, name: &str) -> Result<ResourcePermission, StoreError>;

    /// Publishes every write.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Drops every write.
    fn rollback(self: Box<Self>);
}

/// Query parameter holding a JSON list of [`QueryFilter`]s.
pub const QUERY_PARAM: &str = "query";

/// A read-list request.
///
/// Parameters are the resolved outcome attributes rendered to strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Table to list.
    pub table: String,
    /// Query parameters.
    pub params: BTreeMap<String, String>,
}

impl ListQuery {
    /// Lists every row of the table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Folds resolved attributes into parameters.
    ///
    /// Strings are kept as-is; `query` is JSON-encoded when it is not a
    /// string; every other value is rendered to text.
    #[must_use]
    pub fn from_attributes(table: impl Into<String>, attributes: &Row) -> Self {
        let params = attributes
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other if key == QUERY_PARAM => other.to_string(),
                    other => actuate_types::render_text(other),
                };
                (key.clone(), text)
            })
            .collect();
        Self {
            table: table.into(),
            params,
        }
    }

    /// Column equality filters: every parameter except `query`.
    pub fn equalities(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .filter(|(key, _)| key.as_str() != QUERY_PARAM)
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Filters encoded in the `query` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when `query` is not a JSON list of
    /// filters.
    pub fn filters(&self) -> Result<Vec<QueryFilter>, StoreError> {
        match self.params.get(QUERY_PARAM) {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| StoreError::invalid(&self.table, format!("bad query: {e}"))),
        }
    }
}

/// One structured filter of a read-list query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryFilter {
    /// Column name.
    pub column: String,
    /// Comparison; only `is` is understood by the in-memory store.
    #[serde(default = "default_operator")]
    pub operator: String,
    /// Expected value.
    pub value: Value,
}

fn default_operator() -> String {
    "is".to_string()
}
