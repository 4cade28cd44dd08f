//! Named extension handlers and their registry.
//!
//! An outcome with method `EXECUTE` (or an unrecognised method) is handed
//! to the [`ActionPerformer`] registered under the outcome type. The
//! registry is assembled once through [`PerformerRegistryBuilder`] and is
//! read-only afterwards.

use crate::{ActionResponse, GuardedTransaction, Outcome, PerformerError, Transaction, WorkQueue};
use actuate_auth::Actor;
use actuate_hook::InterceptorChain;
use actuate_types::Row;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a performer hands back to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    /// Value stored under the outcome's `reference`, if any.
    pub result: Option<Value>,
    /// User-visible responses.
    pub responses: Vec<ActionResponse>,
}

impl StepOutput {
    /// Output with a result and no responses.
    #[must_use]
    pub fn result(value: Value) -> Self {
        Self {
            result: Some(value),
            responses: Vec::new(),
        }
    }

    /// Output with a single response.
    #[must_use]
    pub fn respond(response: ActionResponse) -> Self {
        Self {
            result: None,
            responses: vec![response],
        }
    }

    /// Adds a response.
    #[must_use]
    pub fn and_respond(mut self, response: ActionResponse) -> Self {
        self.responses.push(response);
        self
    }
}

/// Collaborators a performer may use during one step.
pub struct StepContext<'a> {
    /// The invocation's transaction, unguarded.
    pub tx: &'a mut dyn Transaction,
    /// The invoking actor.
    pub actor: &'a Actor,
    /// Queue for fire-and-forget work.
    pub queue: &'a dyn WorkQueue,
    /// Chain applied by [`guarded`](Self::guarded).
    pub chain: &'a InterceptorChain,
}

impl<'a> StepContext<'a> {
    /// The transaction wrapped by the interceptor chain.
    pub fn guarded(&mut self) -> GuardedTransaction<'_> {
        GuardedTransaction::new(&mut *self.tx, self.chain, self.actor)
    }
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

/// A named extension invoked by `EXECUTE` outcomes.
pub trait ActionPerformer: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Runs the extension with the outcome's resolved attributes.
    ///
    /// # Errors
    ///
    /// Returns [`PerformerError`]; the dispatcher turns it into a failure
    /// notification and stops the outcome loop.
    fn do_action(
        &self,
        outcome: &Outcome,
        attributes: &Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError>;
}

/// Name-keyed performers. Immutable once built.
#[derive(Clone, Default)]
pub struct PerformerRegistry {
    performers: HashMap<String, Arc<dyn ActionPerformer>>,
}

impl PerformerRegistry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> PerformerRegistryBuilder {
        PerformerRegistryBuilder::default()
    }

    /// Performer registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ActionPerformer>> {
        self.performers.get(name)
    }

    /// Whether a performer is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.performers.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.performers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of performers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.performers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.performers.is_empty()
    }
}

impl fmt::Debug for PerformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformerRegistry")
            .field("performers", &self.names())
            .finish()
    }
}

/// Collects performers before the registry is frozen.
#[derive(Default)]
pub struct PerformerRegistryBuilder {
    performers: HashMap<String, Arc<dyn ActionPerformer>>,
}

impl PerformerRegistryBuilder {
    /// Adds a performer. A later registration under the same name replaces
    /// the earlier one.
    #[must_use]
    pub fn register(mut self, performer: Arc<dyn ActionPerformer>) -> Self {
        let name = performer.name().to_string();
        if self.performers.insert(name.clone(), performer).is_some() {
            warn!(performer = %name, "performer replaced");
        } else {
            debug!(performer = %name, "performer registered");
        }
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> PerformerRegistry {
        PerformerRegistry {
            performers: self.performers,
        }
    }
}
