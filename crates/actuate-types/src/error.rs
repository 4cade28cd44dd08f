//! Error contracts shared across crates.
//!
//! [`ErrorCode`] gives every boundary error a stable machine-readable code
//! so callers (the CLI, a transport layer) can map failures without
//! matching on message text. [`StoreError`] is the failure surface of the
//! storage collaborator and is carried unchanged through the interceptor
//! chain and the dispatcher.

use thiserror::Error;

/// Machine-readable code for an error.
///
/// # Code Format
///
/// - UPPER_SNAKE_CASE, prefixed with the owning domain (`"STORE_"`,
///   `"ACTION_"`, `"SCRIPT_"`)
/// - Stable once published
///
/// # Example
///
/// ```
/// use actuate_types::ErrorCode;
///
/// #[derive(Debug)]
/// enum MailError {
///     Unreachable,
///     Rejected,
/// }
///
/// impl ErrorCode for MailError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::Unreachable => "MAIL_UNREACHABLE",
///             Self::Rejected => "MAIL_REJECTED",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         matches!(self, Self::Unreachable)
///     }
/// }
///
/// assert_eq!(MailError::Rejected.code(), "MAIL_REJECTED");
/// assert!(MailError::Unreachable.is_recoverable());
/// ```
pub trait ErrorCode {
    /// Returns the stable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying (or correcting input) may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code is UPPER_SNAKE_CASE and carries the prefix.
///
/// Intended for tests that enumerate the variants of an error type.
///
/// # Panics
///
/// Panics with a descriptive message if the code violates the convention.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{code}' must start with prefix '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Failure reported by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No row with the given id exists in the table.
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table name.
        table: String,
        /// Requested reference id.
        id: String,
    },

    /// The table is not known to the store.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The row or query was rejected as malformed.
    #[error("invalid input for {table}: {message}")]
    Invalid {
        /// Table name.
        table: String,
        /// Reason.
        message: String,
    },

    /// A conflicting write (duplicate id, concurrent commit).
    #[error("conflict on {table}: {message}")]
    Conflict {
        /// Table name.
        table: String,
        /// Reason.
        message: String,
    },

    /// Any other backend failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(table: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.to_string(),
        }
    }

    /// Creates an invalid-input error.
    pub fn invalid(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "STORE_NOT_FOUND",
            Self::UnknownTable(_) => "STORE_UNKNOWN_TABLE",
            Self::Invalid { .. } => "STORE_INVALID",
            Self::Conflict { .. } => "STORE_CONFLICT",
            Self::Backend(_) => "STORE_BACKEND",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_codes_follow_convention() {
        let all = [
            StoreError::not_found("user_account", "x"),
            StoreError::UnknownTable("t".into()),
            StoreError::invalid("t", "bad"),
            StoreError::Conflict {
                table: "t".into(),
                message: "dup".into(),
            },
            StoreError::Backend("io".into()),
        ];
        for err in &all {
            assert_error_code(err, "STORE_");
        }
    }

    #[test]
    fn not_found_display() {
        let err = StoreError::not_found("user_account", "abc");
        assert_eq!(err.to_string(), "user_account row abc not found");
        assert!(err.is_not_found());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn conflict_is_recoverable() {
        let err = StoreError::Conflict {
            table: "t".into(),
            message: "stale snapshot".into(),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_error_code_wrong_prefix() {
        assert_error_code(&StoreError::Backend("x".into()), "ACTION_");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("STORE_NOT_FOUND"));
        assert!(is_upper_snake_case("E123"));
        assert!(!is_upper_snake_case("store"));
        assert!(!is_upper_snake_case("_X"));
        assert!(!is_upper_snake_case("X__Y"));
    }
}
