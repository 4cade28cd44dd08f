//! Access denied error.
//!
//! [`AccessDenied`] names the level at which a check failed:
//!
//! ```text
//! action  -> table-level EXECUTE on the action itself
//! subject -> EXECUTE on the row the action targets
//! table   -> table gate in front of a CRUD verb
//! rows    -> row gate filtered every candidate away
//! ```

use crate::Capability;
use actuate_types::ErrorCode;
use thiserror::Error;

/// A permission check failed.
///
/// # Example
///
/// ```
/// use actuate_auth::{AccessDenied, Capability};
///
/// let err = AccessDenied::Table {
///     table: "invoice".into(),
///     required: Capability::UPDATE,
/// };
/// assert_eq!(err.to_string(), "access denied: UPDATE on table invoice");
/// assert_eq!(err.level(), "table");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// The actor may not invoke the action.
    #[error("access denied: cannot execute action {action} on {table}")]
    Action {
        /// Table the action is declared on.
        table: String,
        /// Action name.
        action: String,
    },

    /// The actor may not execute against the subject row.
    #[error("access denied: cannot execute on {table} row {id}")]
    Subject {
        /// Table of the subject row.
        table: String,
        /// Subject reference id.
        id: String,
    },

    /// The table gate rejected the verb.
    #[error("access denied: {required} on table {table}")]
    Table {
        /// Table name.
        table: String,
        /// Capability the verb required.
        required: Capability,
    },

    /// Every candidate row was filtered out by the row gate.
    #[error("access denied: {required} on {candidates} {table} row(s)")]
    Rows {
        /// Table name.
        table: String,
        /// Capability the verb required per row.
        required: Capability,
        /// Number of rows that were filtered out.
        candidates: usize,
    },
}

impl AccessDenied {
    /// Returns the level that denied access.
    #[must_use]
    pub fn level(&self) -> &'static str {
        match self {
            Self::Action { .. } => "action",
            Self::Subject { .. } => "subject",
            Self::Table { .. } => "table",
            Self::Rows { .. } => "rows",
        }
    }
}

impl ErrorCode for AccessDenied {
    fn code(&self) -> &'static str {
        match self {
            Self::Action { .. } => "AUTH_ACTION_DENIED",
            Self::Subject { .. } => "AUTH_SUBJECT_DENIED",
            Self::Table { .. } => "AUTH_TABLE_DENIED",
            Self::Rows { .. } => "AUTH_ROWS_DENIED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
