//! Error types for the interceptor chain.

use actuate_auth::AccessDenied;
use actuate_types::{ErrorCode, StoreError};
use thiserror::Error;

/// Why an intercepted verb did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterceptError {
    /// A permission gate rejected the verb.
    #[error(transparent)]
    Denied(#[from] AccessDenied),

    /// Permission data could not be read.
    #[error("permission lookup failed for {table}: {source}")]
    Lookup {
        /// Table whose permission data was requested.
        table: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },

    /// A custom interceptor aborted the verb.
    #[error("interceptor {interceptor} rejected the operation: {reason}")]
    Rejected {
        /// ID of the interceptor.
        interceptor: String,
        /// Reason given.
        reason: String,
    },

    /// Unknown intercept point string.
    #[error("unknown intercept point: {0}")]
    UnknownPoint(String),

    /// Invalid table pattern.
    #[error("invalid table pattern: {0}")]
    InvalidPattern(String),
}

impl InterceptError {
    /// Wraps a store failure raised while reading permission data.
    pub fn lookup(table: impl Into<String>, source: StoreError) -> Self {
        Self::Lookup {
            table: table.into(),
            source,
        }
    }

    /// Returns `true` when a permission gate denied access.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }
}

impl ErrorCode for InterceptError {
    fn code(&self) -> &'static str {
        match self {
            Self::Denied(_) => "INTERCEPT_DENIED",
            Self::Lookup { .. } => "INTERCEPT_LOOKUP_FAILED",
            Self::Rejected { .. } => "INTERCEPT_REJECTED",
            Self::UnknownPoint(_) => "INTERCEPT_UNKNOWN_POINT",
            Self::InvalidPattern(_) => "INTERCEPT_INVALID_PATTERN",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Lookup { source, .. } if source.is_recoverable())
    }
}
