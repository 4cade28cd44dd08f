//! Error types for action invocation.
//!
//! ```text
//! ActionError
//! ├── UnknownAction        no definition for (type, name)
//! ├── SubjectNotFound      before validation
//! ├── PermissionDenied     subject / action gate
//! ├── Validation           before any outcome
//! ├── OutcomeBuild         attribute resolution inside a step
//! ├── Handler              CRUD or performer failure inside a step
//! └── Store                transaction begin / commit
//! ```

use crate::ActionResponse;
use actuate_auth::AccessDenied;
use actuate_hook::InterceptError;
use actuate_script::ResolveError;
use actuate_types::{ErrorCode, StoreError};
use thiserror::Error;

/// Input rejected by in-field extraction or a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent.
    #[error("field {field} cannot be blank")]
    Blank {
        /// Column name.
        field: String,
    },

    /// A validation tag rejected the value.
    #[error("invalid value for {column}: {reason}")]
    Invalid {
        /// Column name.
        column: String,
        /// The failing tag and why.
        reason: String,
    },

    /// The rule names a tag that does not exist.
    #[error("unknown validation tag '{tag}' on {column}")]
    UnknownTag {
        /// Column name.
        column: String,
        /// The unknown tag.
        tag: String,
    },
}

impl ValidationError {
    pub(crate) fn invalid(column: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::Blank { .. } => "VALIDATION_BLANK",
            Self::Invalid { .. } => "VALIDATION_INVALID",
            Self::UnknownTag { .. } => "VALIDATION_UNKNOWN_TAG",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownTag { .. })
    }
}

/// Failure raised by an [`ActionPerformer`](crate::ActionPerformer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerformerError {
    /// A required attribute was not supplied.
    #[error("missing attribute: {0}")]
    MissingAttribute(String),

    /// An attribute has the wrong shape.
    #[error("invalid attribute {name}: {message}")]
    InvalidAttribute {
        /// Attribute name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// The store failed underneath the performer.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The performer ran and failed.
    #[error("{performer} failed: {message}")]
    Failed {
        /// Performer name.
        performer: String,
        /// Reason.
        message: String,
    },
}

impl PerformerError {
    /// Creates a `Failed` error.
    pub fn failed(performer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            performer: performer.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidAttribute` error.
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for PerformerError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingAttribute(_) => "PERFORMER_MISSING_ATTRIBUTE",
            Self::InvalidAttribute { .. } => "PERFORMER_INVALID_ATTRIBUTE",
            Self::Store(_) => "PERFORMER_STORE",
            Self::Failed { .. } => "PERFORMER_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::MissingAttribute(_) | Self::InvalidAttribute { .. } => true,
            Self::Store(err) => err.is_recoverable(),
            Self::Failed { .. } => false,
        }
    }
}

/// Failure of the handler an outcome was routed to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The interceptor chain aborted the verb.
    #[error(transparent)]
    Intercept(#[from] InterceptError),

    /// The store rejected the verb.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A performer failed.
    #[error(transparent)]
    Performer(#[from] PerformerError),

    /// `GET_BY_ID`, `PATCH` and `DELETE` need a resolved `reference_id`.
    #[error("no reference_id provided for {method}")]
    MissingReferenceId {
        /// Method name.
        method: String,
    },

    /// `EXECUTE` named a performer that is not registered.
    #[error("no performer registered as {0}")]
    UnknownPerformer(String),

    /// A schema upload could not be decoded or written.
    #[error("schema upload failed: {0}")]
    SchemaUpload(String),
}

impl HandlerError {
    /// Returns `true` when a permission gate denied the verb.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Intercept(err) if err.is_denied())
    }
}

impl ErrorCode for HandlerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Intercept(_) => "HANDLER_INTERCEPTED",
            Self::Store(_) => "HANDLER_STORE",
            Self::Performer(_) => "HANDLER_PERFORMER",
            Self::MissingReferenceId { .. } => "HANDLER_MISSING_REFERENCE_ID",
            Self::UnknownPerformer(_) => "HANDLER_UNKNOWN_PERFORMER",
            Self::SchemaUpload(_) => "HANDLER_SCHEMA_UPLOAD",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Intercept(err) => err.is_recoverable(),
            Self::Store(err) => err.is_recoverable(),
            Self::Performer(err) => err.is_recoverable(),
            Self::MissingReferenceId { .. } => true,
            Self::UnknownPerformer(_) | Self::SchemaUpload(_) => false,
        }
    }
}

/// Why an invocation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No action is defined for the type and name.
    #[error("no such action: {on_type}.{name}")]
    UnknownAction {
        /// Table the action was requested on.
        on_type: String,
        /// Action name.
        name: String,
    },

    /// The action needs a subject and none was resolved.
    #[error("subject not found for {on_type}: {reference}")]
    SubjectNotFound {
        /// Subject table.
        on_type: String,
        /// The id that was supplied, or empty.
        reference: String,
    },

    /// The subject or action gate denied the actor.
    #[error(transparent)]
    PermissionDenied(#[from] AccessDenied),

    /// Input failed extraction or validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An outcome's attributes could not be resolved.
    #[error("failed to build outcome {outcome}: {source}")]
    OutcomeBuild {
        /// Outcome type.
        outcome: String,
        /// Resolution failure.
        #[source]
        source: ResolveError,
    },

    /// The handler an outcome was routed to failed.
    #[error("outcome {outcome} failed: {source}")]
    Handler {
        /// Outcome type.
        outcome: String,
        /// Handler failure.
        #[source]
        source: HandlerError,
    },

    /// The store failed outside any outcome.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ActionError {
    /// Returns `true` for any permission denial, including row-level
    /// denials raised inside an outcome.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::Handler { source, .. } => source.is_denied(),
            _ => false,
        }
    }
}

impl ErrorCode for ActionError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownAction { .. } => "ACTION_UNKNOWN",
            Self::SubjectNotFound { .. } => "ACTION_SUBJECT_NOT_FOUND",
            Self::PermissionDenied(_) => "ACTION_PERMISSION_DENIED",
            Self::Validation(_) => "ACTION_VALIDATION",
            Self::OutcomeBuild { .. } => "ACTION_OUTCOME_BUILD",
            Self::Handler { .. } => "ACTION_HANDLER",
            Self::Store(_) => "ACTION_STORE",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(err) => err.is_recoverable(),
            Self::Handler { source, .. } => source.is_recoverable(),
            Self::Store(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

/// A failed invocation together with the responses emitted before it
/// stopped.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct ActionFailure {
    /// Why the invocation stopped.
    #[source]
    pub error: ActionError,
    /// Responses accumulated up to and including the failure notice.
    pub responses: Vec<ActionResponse>,
}

impl ActionFailure {
    /// A failure with no responses.
    #[must_use]
    pub fn bare(error: impl Into<ActionError>) -> Self {
        Self {
            error: error.into(),
            responses: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuate_auth::Capability;
    use actuate_types::assert_error_code;

    #[test]
    fn codes_follow_convention() {
        let validation = [
            ValidationError::Blank { field: "email".into() },
            ValidationError::invalid("email", "email"),
            ValidationError::UnknownTag {
                column: "email".into(),
                tag: "fancy".into(),
            },
        ];
        for err in &validation {
            assert_error_code(err, "VALIDATION_");
        }

        let handler = [
            HandlerError::Store(StoreError::UnknownTable("x".into())),
            HandlerError::Performer(PerformerError::MissingAttribute("x".into())),
            HandlerError::MissingReferenceId { method: "DELETE".into() },
            HandlerError::UnknownPerformer("x".into()),
            HandlerError::SchemaUpload("x".into()),
        ];
        for err in &handler {
            assert_error_code(err, "HANDLER_");
        }

        let action = [
            ActionError::UnknownAction {
                on_type: "t".into(),
                name: "n".into(),
            },
            ActionError::SubjectNotFound {
                on_type: "t".into(),
                reference: String::new(),
            },
            ActionError::Validation(ValidationError::Blank { field: "f".into() }),
            ActionError::Store(StoreError::Backend("down".into())),
        ];
        for err in &action {
            assert_error_code(err, "ACTION_");
        }
    }

    #[test]
    fn row_denial_inside_outcome_counts_as_denied() {
        let denied = AccessDenied::Rows {
            table: "note".into(),
            required: Capability::UPDATE,
            candidates: 1,
        };
        let err = ActionError::Handler {
            outcome: "note".into(),
            source: HandlerError::Intercept(InterceptError::from(denied)),
        };
        assert!(err.is_permission_denied());
        assert!(!ActionError::Store(StoreError::Backend("x".into())).is_permission_denied());
    }

    #[test]
    fn blank_message() {
        let err = ValidationError::Blank { field: "email".into() };
        assert_eq!(err.to_string(), "field email cannot be blank");
    }

    #[test]
    fn failure_displays_inner_error() {
        let failure = ActionFailure::bare(ActionError::UnknownAction {
            on_type: "user_account".into(),
            name: "nope".into(),
        });
        assert_eq!(failure.to_string(), "no such action: user_account.nope");
        assert!(failure.responses.is_empty());
    }
}
