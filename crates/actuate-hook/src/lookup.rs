//! Read access to stored permission data.

use actuate_auth::ResourcePermission;
use actuate_types::{ReferenceId, Row, StoreError};

/// Permission data the gates read from the store.
///
/// Implemented by the storage transaction so that every check within an
/// invocation sees the same snapshot.
pub trait PermissionLookup {
    /// Ownership row of a table.
    fn table_permission(&self, table: &str) -> Result<ResourcePermission, StoreError>;

    /// Ownership, permission value and group grants of one row.
    fn row_permission(&self, table: &str, row: &Row) -> Result<ResourcePermission, StoreError>;

    /// Fetches candidate rows by id, skipping ids that do not exist.
    fn fetch_rows(&self, table: &str, ids: &[ReferenceId]) -> Result<Vec<Row>, StoreError>;
}
