//! In-memory [`Store`] seeded from a JSON fixture.
//!
//! Each transaction works on a clone of the committed state. Commit
//! publishes the clone when nothing else committed in between; rollback
//! drops it.
//!
//! # Fixture shape
//!
//! ```json
//! {
//!   "tables": {
//!     "note": {
//!       "owner": null,
//!       "permission": {"owner": "all", "group": "read", "world": "peek|read"},
//!       "groups": [],
//!       "rows": [{"title": "hello", "permission": 262143}],
//!       "row_groups": {"<reference_id>": [{"group_id": "...", "permission": 65280}]}
//!     }
//!   },
//!   "actions": [
//!     {"type": "note", "name": "publish", "permission": {"world": "execute"}}
//!   ],
//!   "actors": [{"user_id": "...", "groups": [], "administrator": false}]
//! }
//! ```

use crate::{ListQuery, QueryFilter, Store, Transaction};
use actuate_auth::{Actor, GroupGrant, PermissionValue, ResourcePermission};
use actuate_hook::PermissionLookup;
use actuate_types::{column, owner_of, reference_id_of, render_text, ReferenceId, Row, StoreError};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// List parameters that page or sort rather than filter.
const RESERVED_PARAMS: &[&str] = &["page[size]", "page[number]", "sort", "included_relations", "fields"];

/// Seed data for a [`MemoryStore`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Tables by name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableFixture>,
    /// Per-action permissions.
    #[serde(default)]
    pub actions: Vec<ActionFixture>,
    /// Known actors.
    #[serde(default)]
    pub actors: Vec<Actor>,
}

impl Fixture {
    /// Actor whose user id is `id`.
    #[must_use]
    pub fn actor(&self, id: ReferenceId) -> Option<Actor> {
        self.actors.iter().find(|a| a.user_id() == Some(id)).cloned()
    }
}

/// One table of a [`Fixture`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableFixture {
    /// Owner of the table's ownership row.
    #[serde(default)]
    pub owner: Option<ReferenceId>,
    /// Permission of the table's ownership row.
    #[serde(default)]
    pub permission: PermissionValue,
    /// Groups linked to the table.
    #[serde(default)]
    pub groups: Vec<GroupGrant>,
    /// Initial rows.
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Group grants per row id.
    #[serde(default)]
    pub row_groups: HashMap<ReferenceId, Vec<GroupGrant>>,
}

/// Permission of one action in a [`Fixture`].
#[derive(Debug, Clone, Deserialize)]
pub struct ActionFixture {
    /// Table the action is declared on.
    #[serde(rename = "type")]
    pub on_type: String,
    /// Action name.
    pub name: String,
    /// Action owner.
    #[serde(default)]
    pub owner: Option<ReferenceId>,
    /// Packed permission.
    #[serde(default)]
    pub permission: PermissionValue,
    /// Groups linked to the action.
    #[serde(default)]
    pub groups: Vec<GroupGrant>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    ownership: ResourcePermission,
    rows: Vec<Row>,
    row_groups: HashMap<ReferenceId, Vec<GroupGrant>>,
}

impl Table {
    fn position(&self, id: ReferenceId) -> Option<usize> {
        self.rows.iter().position(|row| reference_id_of(row) == Some(id))
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    version: u64,
    tables: BTreeMap<String, Table>,
    actions: HashMap<(String, String), ResourcePermission>,
}

impl State {
    fn table(&self, name: &str) -> Result<&Table, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }
}

/// Stamps `reference_id` (when missing or malformed) and `__type`.
fn normalize(table: &str, mut row: Row) -> Row {
    if reference_id_of(&row).is_none() {
        row.insert(
            column::REFERENCE_ID.into(),
            Value::String(ReferenceId::new().to_string()),
        );
    }
    row.insert(column::TYPE.into(), Value::String(table.to_string()));
    row
}

/// Row-level [`PermissionLookup`] calls made through a store's transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupCalls {
    /// Calls to [`PermissionLookup::fetch_rows`].
    pub fetch_rows: usize,
    /// Calls to [`PermissionLookup::row_permission`].
    pub row_permission: usize,
}

#[derive(Debug, Default)]
struct LookupCounters {
    fetch_rows: AtomicUsize,
    row_permission: AtomicUsize,
}

/// Snapshot-isolated in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    counters: Arc<LookupCounters>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from seed data.
    #[must_use]
    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut state = State::default();
        for (name, seed) in fixture.tables {
            let rows = seed.rows.into_iter().map(|row| normalize(&name, row)).collect();
            let ownership = ResourcePermission {
                owner: seed.owner,
                permission: seed.permission,
                groups: seed.groups,
            };
            state.tables.insert(
                name,
                Table {
                    ownership,
                    rows,
                    row_groups: seed.row_groups,
                },
            );
        }
        for action in fixture.actions {
            let permission = ResourcePermission {
                owner: action.owner,
                permission: action.permission,
                groups: action.groups,
            };
            state.actions.insert((action.on_type, action.name), permission);
        }
        debug!(
            tables = state.tables.len(),
            actions = state.actions.len(),
            "memory store loaded"
        );
        Self {
            state: Arc::new(RwLock::new(state)),
            counters: Arc::default(),
        }
    }

    /// Declares a table with the given ownership permission.
    pub fn define_table(&self, name: &str, ownership: ResourcePermission) {
        let mut state = self.state.write();
        state.tables.entry(name.to_string()).or_default().ownership = ownership;
    }

    /// Sets the permission of an action.
    pub fn set_action_permission(&self, on_type: &str, name: &str, permission: ResourcePermission) {
        self.state
            .write()
            .actions
            .insert((on_type.to_string(), name.to_string()), permission);
    }

    /// Committed rows of a table.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .read()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of commits so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Row-level lookups served so far, across all transactions.
    #[must_use]
    pub fn lookup_calls(&self) -> LookupCalls {
        LookupCalls {
            fetch_rows: self.counters.fetch_rows.load(Ordering::Relaxed),
            row_permission: self.counters.row_permission.load(Ordering::Relaxed),
        }
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let snapshot = self.state.read().clone();
        trace!(version = snapshot.version, "memory transaction started");
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            snapshot,
            dirty: false,
        }))
    }
}

/// A transaction over a [`MemoryStore`] snapshot.
#[derive(Debug)]
pub struct MemoryTransaction {
    shared: Arc<RwLock<State>>,
    counters: Arc<LookupCounters>,
    snapshot: State,
    dirty: bool,
}

fn matches_filter(row: &Row, filter: &QueryFilter) -> Result<bool, StoreError> {
    match filter.operator.as_str() {
        "is" | "=" => Ok(row.get(&filter.column).is_some_and(|value| {
            value == &filter.value || render_text(value) == render_text(&filter.value)
        })),
        other => Err(StoreError::invalid(
            &filter.column,
            format!("unsupported operator {other}"),
        )),
    }
}

impl PermissionLookup for MemoryTransaction {
    fn table_permission(&self, table: &str) -> Result<ResourcePermission, StoreError> {
        Ok(self.snapshot.table(table)?.ownership.clone())
    }

    fn row_permission(&self, table: &str, row: &Row) -> Result<ResourcePermission, StoreError> {
        self.counters.row_permission.fetch_add(1, Ordering::Relaxed);
        let permission = match row.get(column::PERMISSION) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                StoreError::invalid(table, format!("bad permission column: {e}"))
            })?,
            None => PermissionValue::NONE,
        };
        let groups = reference_id_of(row)
            .and_then(|id| self.snapshot.tables.get(table)?.row_groups.get(&id).cloned())
            .unwrap_or_default();
        Ok(ResourcePermission {
            owner: owner_of(row),
            permission,
            groups,
        })
    }

    fn fetch_rows(&self, table: &str, ids: &[ReferenceId]) -> Result<Vec<Row>, StoreError> {
        self.counters.fetch_rows.fetch_add(1, Ordering::Relaxed);
        let table = self.snapshot.table(table)?;
        Ok(table
            .rows
            .iter()
            .filter(|row| reference_id_of(row).is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect())
    }
}

impl Transaction for MemoryTransaction {
    fn as_lookup(&self) -> &dyn PermissionLookup {
        self
    }

    fn create(&mut self, table: &str, row: Row) -> Result<Row, StoreError> {
        let row = normalize(table, row);
        let target = self.snapshot.table_mut(table)?;
        if let Some(id) = reference_id_of(&row) {
            if target.position(id).is_some() {
                return Err(StoreError::Conflict {
                    table: table.to_string(),
                    message: format!("duplicate reference_id {id}"),
                });
            }
        }
        target.rows.push(row.clone());
        self.dirty = true;
        debug!(table, "row created");
        Ok(row)
    }

    fn read_list(&self, query: &ListQuery) -> Result<Vec<Row>, StoreError> {
        let table = self.snapshot.table(&query.table)?;
        let filters = query.filters()?;
        let equalities: Vec<(&str, &str)> = query
            .equalities()
            .filter(|(key, _)| !RESERVED_PARAMS.contains(key))
            .collect();

        let mut rows = Vec::new();
        for row in &table.rows {
            let equal = equalities.iter().all(|(key, expected)| {
                row.get(*key).is_some_and(|value| render_text(value) == *expected)
            });
            if !equal {
                continue;
            }
            let mut keep = true;
            for filter in &filters {
                if !matches_filter(row, filter)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                rows.push(row.clone());
            }
        }
        trace!(table = %query.table, rows = rows.len(), "rows listed");
        Ok(rows)
    }

    fn read_one(&self, table: &str, id: ReferenceId) -> Result<Row, StoreError> {
        let target = self.snapshot.table(table)?;
        target
            .position(id)
            .map(|i| target.rows[i].clone())
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    fn update(&mut self, table: &str, id: ReferenceId, changes: Row) -> Result<Row, StoreError> {
        let target = self.snapshot.table_mut(table)?;
        let index = target
            .position(id)
            .ok_or_else(|| StoreError::not_found(table, id))?;
        let row = &mut target.rows[index];
        for (key, value) in changes {
            if key == column::REFERENCE_ID || key == column::TYPE {
                continue;
            }
            row.insert(key, value);
        }
        let updated = row.clone();
        self.dirty = true;
        debug!(table, %id, "row updated");
        Ok(updated)
    }

    fn delete(&mut self, table: &str, id: ReferenceId) -> Result<(), StoreError> {
        let target = self.snapshot.table_mut(table)?;
        let index = target
            .position(id)
            .ok_or_else(|| StoreError::not_found(table, id))?;
        target.rows.remove(index);
        target.row_groups.remove(&id);
        self.dirty = true;
        debug!(table, %id, "row deleted");
        Ok(())
    }

    fn action_permission(&self, table: &str, name: &str) -> Result<ResourcePermission, StoreError> {
        Ok(self
            .snapshot
            .actions
            .get(&(table.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let mut shared = self.shared.write();
        if shared.version != self.snapshot.version {
            warn!(
                expected = self.snapshot.version,
                found = shared.version,
                "concurrent commit detected"
            );
            return Err(StoreError::Conflict {
                table: String::new(),
                message: "store changed since the transaction began".into(),
            });
        }
        let mut next = self.snapshot;
        next.version += 1;
        debug!(version = next.version, "memory transaction committed");
        *shared = next;
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        if self.dirty {
            debug!("memory transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuate_auth::Capability;
    use serde_json::json;

    fn fixture() -> (Fixture, ReferenceId, ReferenceId) {
        let id = ReferenceId::new();
        let user = ReferenceId::new();
        let fixture: Fixture = serde_json::from_value(json!({
            "tables": {
                "user_account": {
                    "permission": {"world": "read"},
                    "rows": [
                        {"reference_id": id.to_string(), "email": "a@b.c", "age": 30},
                        {"email": "x@y.z", "age": 41}
                    ]
                }
            },
            "actions": [
                {"type": "user_account", "name": "signup", "permission": {"world": "execute"}}
            ],
            "actors": [{"user_id": user.to_string()}]
        }))
        .expect("fixture");
        (fixture, id, user)
    }

    #[test]
    fn loads_and_stamps_rows() {
        let (fixture, id, user) = fixture();
        assert!(fixture.actor(user).is_some());
        let store = MemoryStore::from_fixture(fixture);
        let rows = store.rows("user_account");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r[column::TYPE] == json!("user_account")));
        assert!(rows.iter().all(|r| reference_id_of(r).is_some()));
        assert_eq!(reference_id_of(&rows[0]), Some(id));
    }

    #[test]
    fn list_filters_by_equality_and_query() {
        let (fixture, id, _) = fixture();
        let store = MemoryStore::from_fixture(fixture);
        let tx = store.begin().expect("begin");

        let by_email = tx
            .read_list(&ListQuery::new("user_account").param("email", "a@b.c"))
            .expect("list");
        assert_eq!(by_email.len(), 1);
        assert_eq!(reference_id_of(&by_email[0]), Some(id));

        let by_query = tx
            .read_list(
                &ListQuery::new("user_account")
                    .param("query", r#"[{"column": "age", "operator": "is", "value": 41}]"#)
                    .param("page[size]", "10"),
            )
            .expect("list");
        assert_eq!(by_query.len(), 1);
        assert_eq!(by_query[0]["email"], json!("x@y.z"));

        let err = tx
            .read_list(
                &ListQuery::new("user_account")
                    .param("query", r#"[{"column": "age", "operator": "like", "value": 4}]"#),
            )
            .expect_err("unsupported");
        assert!(matches!(err, StoreError::Invalid { .. }));
    }

    #[test]
    fn rollback_discards_writes() {
        let (fixture, id, _) = fixture();
        let store = MemoryStore::from_fixture(fixture);
        let mut tx = store.begin().expect("begin");
        tx.delete("user_account", id).expect("delete");
        assert!(tx.read_one("user_account", id).is_err());
        tx.rollback();
        assert_eq!(store.rows("user_account").len(), 2);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn commit_publishes_and_detects_conflicts() {
        let (fixture, id, _) = fixture();
        let store = MemoryStore::from_fixture(fixture);

        let mut first = store.begin().expect("begin");
        let mut second = store.begin().expect("begin");
        let mut changes = Row::new();
        changes.insert("age".into(), json!(31));
        changes.insert(column::REFERENCE_ID.into(), json!("ignored"));
        let updated = first.update("user_account", id, changes).expect("update");
        assert_eq!(updated["age"], json!(31));
        assert_eq!(reference_id_of(&updated), Some(id));
        first.commit().expect("commit");
        assert_eq!(store.version(), 1);

        second.delete("user_account", id).expect("delete");
        assert!(matches!(second.commit(), Err(StoreError::Conflict { .. })));
        assert_eq!(store.rows("user_account").len(), 2);
    }

    #[test]
    fn permissions() {
        let (fixture, id, _) = fixture();
        let store = MemoryStore::from_fixture(fixture);
        let tx = store.begin().expect("begin");

        let table = tx.table_permission("user_account").expect("table");
        assert!(table.permission.allows(actuate_auth::Tier::World, Capability::READ));
        assert!(matches!(
            tx.table_permission("ghost"),
            Err(StoreError::UnknownTable(_))
        ));

        let action = tx.action_permission("user_account", "signup").expect("action");
        assert!(action.permission.allows(actuate_auth::Tier::World, Capability::EXECUTE));
        assert_eq!(
            tx.action_permission("user_account", "undeclared").expect("action"),
            ResourcePermission::default()
        );

        let row = tx.read_one("user_account", id).expect("row");
        assert_eq!(tx.row_permission("user_account", &row).expect("row").permission, PermissionValue::NONE);
        assert_eq!(tx.fetch_rows("user_account", &[id]).expect("fetch").len(), 1);
        assert_eq!(
            store.lookup_calls(),
            LookupCalls {
                fetch_rows: 1,
                row_permission: 1
            }
        );
    }
}
