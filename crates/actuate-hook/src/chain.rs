//! Interceptor chain: ordered dispatch per intercept point.
//!
//! Built once at engine startup and shared read-only afterwards, so
//! `dispatch()` takes `&self` and needs no lock.

use crate::{InterceptAction, InterceptContext, InterceptPoint, Interceptor, PermissionLookup};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Ordered interceptors indexed by [`InterceptPoint`].
///
/// Within each point, interceptors are sorted by priority (ascending);
/// equal priorities keep registration order.
#[derive(Default, Clone)]
pub struct InterceptorChain {
    interceptors: HashMap<InterceptPoint, Vec<Arc<dyn Interceptor>>>,
}

impl InterceptorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interceptor at every point it declares. Returns its ID.
    pub fn register(&mut self, interceptor: Arc<dyn Interceptor>) -> String {
        let id = interceptor.id().to_string();
        let priority = interceptor.priority();

        for point in interceptor.points() {
            let entry = self.interceptors.entry(point).or_default();
            // Stable: FIFO for same priority
            let pos = entry
                .iter()
                .position(|i| i.priority() > priority)
                .unwrap_or(entry.len());
            entry.insert(pos, Arc::clone(&interceptor));
        }

        debug!(interceptor = %id, priority, "registered interceptor");
        id
    }

    /// Number of (interceptor, point) registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs registered at a point, in execution order.
    #[must_use]
    pub fn ids_at(&self, point: InterceptPoint) -> Vec<&str> {
        self.interceptors
            .get(&point)
            .map(|list| list.iter().map(|i| i.id()).collect())
            .unwrap_or_default()
    }

    /// Runs the interceptors registered at `ctx.point`.
    ///
    /// - Interceptors whose table pattern does not match are skipped
    /// - `Continue` passes the returned context to the next interceptor
    /// - `ShortCircuit` and `Abort` stop the chain and are returned as-is
    ///
    /// Returns `Continue` with the final context when every interceptor ran.
    pub fn dispatch(&self, ctx: InterceptContext, lookup: &dyn PermissionLookup) -> InterceptAction {
        let Some(list) = self.interceptors.get(&ctx.point) else {
            return InterceptAction::proceed(ctx);
        };

        let mut current = ctx;
        for interceptor in list {
            if !interceptor.pattern().matches(&current.table) {
                continue;
            }
            trace!(
                interceptor = interceptor.id(),
                point = %current.point,
                table = %current.table,
                "running interceptor"
            );

            match interceptor.intercept(current, lookup) {
                InterceptAction::Continue(next) => current = *next,
                stop @ (InterceptAction::ShortCircuit(_) | InterceptAction::Abort(_)) => {
                    debug!(interceptor = interceptor.id(), short_circuit = stop.is_short_circuit(), "chain stopped");
                    return stop;
                }
            }
        }

        InterceptAction::proceed(current)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut points: Vec<_> = self
            .interceptors
            .iter()
            .map(|(point, list)| {
                (
                    point.to_string(),
                    list.iter().map(|i| i.id().to_string()).collect::<Vec<_>>(),
                )
            })
            .collect();
        points.sort();
        f.debug_struct("InterceptorChain").field("points", &points).finish()
    }
}
