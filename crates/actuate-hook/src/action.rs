//! Interceptor action: what the chain does after an interceptor runs.
//!
//! `Default` is intentionally not implemented; an interceptor must return
//! the context it was given (or a replacement) explicitly.

use crate::{InterceptContext, InterceptError};
use serde_json::Value;

/// Outcome of a single interceptor.
#[derive(Debug, Clone)]
pub enum InterceptAction {
    /// Continue with the (possibly filtered) context.
    Continue(Box<InterceptContext>),

    /// Stop the chain; the value becomes the verb's result.
    ///
    /// Before-phase: the store is not touched. After-phase: the store's
    /// result is replaced.
    ShortCircuit(Value),

    /// Stop the chain and fail the verb.
    Abort(InterceptError),
}

impl InterceptAction {
    /// Shorthand for `Continue(Box::new(ctx))`.
    #[must_use]
    pub fn proceed(ctx: InterceptContext) -> Self {
        Self::Continue(Box::new(ctx))
    }

    /// Returns `true` if this is a `Continue` variant.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// Returns `true` if this is a `ShortCircuit` variant.
    #[must_use]
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Self::ShortCircuit(_))
    }

    /// Returns `true` if this is an `Abort` variant.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort(_))
    }
}
