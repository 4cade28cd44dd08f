//! Row shape shared with the storage collaborator.

use crate::ReferenceId;
use serde_json::{Map, Value};

/// A stored row or attribute map: column name to JSON value.
pub type Row = Map<String, Value>;

/// Well-known column names.
pub mod column {
    /// Row identifier.
    pub const REFERENCE_ID: &str = "reference_id";
    /// Table the row belongs to.
    pub const TYPE: &str = "__type";
    /// Reference id of the owning user.
    pub const OWNER: &str = "owner_id";
    /// Packed permission value of the row.
    pub const PERMISSION: &str = "permission";
    /// Table holding user profiles.
    pub const USER_TABLE: &str = "user_account";
}

/// Reads the `reference_id` column of a row.
///
/// Returns `None` when the column is missing or not a valid id.
#[must_use]
pub fn reference_id_of(row: &Row) -> Option<ReferenceId> {
    row.get(column::REFERENCE_ID)?.as_str()?.parse().ok()
}

/// Reads the `owner_id` column of a row.
#[must_use]
pub fn owner_of(row: &Row) -> Option<ReferenceId> {
    row.get(column::OWNER)?.as_str()?.parse().ok()
}

/// Renders a JSON value as text for string substitution.
///
/// Strings render without quotes, `null` renders empty, scalars use their
/// JSON form and containers are JSON-encoded.
///
/// ```
/// use actuate_types::render_text;
/// use serde_json::json;
///
/// assert_eq!(render_text(&json!("Bob")), "Bob");
/// assert_eq!(render_text(&json!(2)), "2");
/// assert_eq!(render_text(&json!(null)), "");
/// assert_eq!(render_text(&json!([1, 2])), "[1,2]");
/// ```
#[must_use]
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
