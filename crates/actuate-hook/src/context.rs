//! Data passed along the interceptor chain.

use crate::InterceptPoint;
use actuate_auth::Actor;
use actuate_types::{ReferenceId, Row};
use serde_json::Value;
use std::collections::HashMap;

/// Context handed to each interceptor.
///
/// Before-phase:
/// - `rows` holds the row being created, or is empty
/// - `targets` holds the ids an update/delete addresses
///
/// After-phase: `rows` holds the rows the store returned.
///
/// Interceptors may filter `rows` and `targets`; the guarded transaction
/// acts only on what survives the chain.
#[derive(Debug, Clone)]
pub struct InterceptContext {
    /// Which point triggered this.
    pub point: InterceptPoint,
    /// Table the verb acts on.
    pub table: String,
    /// Who is acting.
    pub actor: Actor,
    /// Candidate or result rows.
    pub rows: Vec<Row>,
    /// Ids addressed by update/delete.
    pub targets: Vec<ReferenceId>,
    /// Whether the verb targets a relationship edge rather than the row itself.
    pub relation: bool,
    /// Cross-interceptor state for the same verb.
    pub metadata: HashMap<String, Value>,
}

impl InterceptContext {
    /// Creates a context with no rows or targets.
    #[must_use]
    pub fn new(point: InterceptPoint, table: impl Into<String>, actor: Actor) -> Self {
        Self {
            point,
            table: table.into(),
            actor,
            rows: Vec::new(),
            targets: Vec::new(),
            relation: false,
            metadata: HashMap::new(),
        }
    }

    /// Sets the rows.
    #[must_use]
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Sets the target ids.
    #[must_use]
    pub fn with_targets(mut self, targets: Vec<ReferenceId>) -> Self {
        self.targets = targets;
        self
    }

    /// Marks the verb as acting on a relationship edge.
    #[must_use]
    pub fn on_relation(mut self) -> Self {
        self.relation = true;
        self
    }

    /// Moves the context to another point, keeping table, actor and metadata.
    #[must_use]
    pub fn advance(mut self, point: InterceptPoint, rows: Vec<Row>) -> Self {
        self.point = point;
        self.rows = rows;
        self
    }
}
