//! Interceptor trait and testing utilities.

use crate::{InterceptAction, InterceptContext, InterceptPoint, PermissionLookup, TablePattern};

/// A single interceptor.
///
/// Registered with the [`InterceptorChain`](crate::InterceptorChain) at
/// every point it returns from [`points`](Self::points). Each interceptor
/// declares:
///
/// - a table pattern (which tables it applies to)
/// - the intercept points it fires at
/// - a priority (order within a point; ties keep registration order)
pub trait Interceptor: Send + Sync {
    /// Unique identifier.
    fn id(&self) -> &str;

    /// Tables this interceptor applies to.
    fn pattern(&self) -> &TablePattern;

    /// Points this interceptor fires at.
    fn points(&self) -> Vec<InterceptPoint>;

    /// Priority (lower = earlier). Default: 100.
    fn priority(&self) -> i32 {
        100
    }

    /// Runs the interceptor.
    fn intercept(&self, ctx: InterceptContext, lookup: &dyn PermissionLookup) -> InterceptAction;
}

/// Test utilities for the interceptor chain.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use crate::InterceptError;
    use actuate_auth::ResourcePermission;
    use actuate_types::{column, owner_of, reference_id_of, ReferenceId, Row, StoreError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A mock interceptor returning whatever its closure produces.
    ///
    /// Tracks invocation count via `call_count`.
    pub struct MockInterceptor {
        /// Interceptor ID.
        pub id: String,
        /// Table pattern.
        pub pattern: TablePattern,
        /// Points it fires at.
        pub points: Vec<InterceptPoint>,
        /// Priority.
        pub priority: i32,
        /// Produces the action for each call.
        pub action_fn: Box<dyn Fn(InterceptContext) -> InterceptAction + Send + Sync>,
        /// Number of times `intercept()` has been called.
        pub call_count: Arc<AtomicUsize>,
    }

    impl MockInterceptor {
        fn with_fn(
            id: &str,
            point: InterceptPoint,
            action_fn: impl Fn(InterceptContext) -> InterceptAction + Send + Sync + 'static,
        ) -> Self {
            Self {
                id: id.to_string(),
                pattern: TablePattern::Any,
                points: vec![point],
                priority: 100,
                action_fn: Box::new(action_fn),
                call_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// A mock that passes the context through unchanged.
        pub fn pass_through(id: &str, point: InterceptPoint) -> Self {
            Self::with_fn(id, point, InterceptAction::proceed)
        }

        /// A mock that edits the context.
        pub fn modifier(
            id: &str,
            point: InterceptPoint,
            modifier: impl Fn(&mut InterceptContext) + Send + Sync + 'static,
        ) -> Self {
            Self::with_fn(id, point, move |mut ctx| {
                modifier(&mut ctx);
                InterceptAction::proceed(ctx)
            })
        }

        /// A mock that aborts with the given reason.
        pub fn aborter(id: &str, point: InterceptPoint, reason: &str) -> Self {
            let interceptor = id.to_string();
            let reason = reason.to_string();
            Self::with_fn(id, point, move |_ctx| {
                InterceptAction::Abort(InterceptError::Rejected {
                    interceptor: interceptor.clone(),
                    reason: reason.clone(),
                })
            })
        }

        /// A mock that short-circuits with the given value.
        pub fn short_circuit(id: &str, point: InterceptPoint, value: serde_json::Value) -> Self {
            Self::with_fn(id, point, move |_ctx| {
                InterceptAction::ShortCircuit(value.clone())
            })
        }

        /// Sets the priority.
        #[must_use]
        pub fn with_priority(mut self, priority: i32) -> Self {
            self.priority = priority;
            self
        }

        /// Restricts the mock to a table pattern.
        #[must_use]
        pub fn for_tables(mut self, pattern: TablePattern) -> Self {
            self.pattern = pattern;
            self
        }

        /// Returns the number of times this interceptor has run.
        pub fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl Interceptor for MockInterceptor {
        fn id(&self) -> &str {
            &self.id
        }

        fn pattern(&self) -> &TablePattern {
            &self.pattern
        }

        fn points(&self) -> Vec<InterceptPoint> {
            self.points.clone()
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn intercept(&self, ctx: InterceptContext, _lookup: &dyn PermissionLookup) -> InterceptAction {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            (self.action_fn)(ctx)
        }
    }

    /// In-memory [`PermissionLookup`] that counts every call.
    ///
    /// Row permissions come from the row's `owner_id` and `permission`
    /// columns plus any grants registered with [`grant`](Self::grant).
    #[derive(Default)]
    pub struct StaticLookup {
        tables: HashMap<String, ResourcePermission>,
        rows: HashMap<String, Vec<Row>>,
        grants: HashMap<ReferenceId, Vec<actuate_auth::GroupGrant>>,
        /// Calls to `table_permission`.
        pub table_calls: AtomicUsize,
        /// Calls to `row_permission`.
        pub row_calls: AtomicUsize,
        /// Calls to `fetch_rows`.
        pub fetch_calls: AtomicUsize,
    }

    impl StaticLookup {
        /// Creates an empty lookup.
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets a table's ownership permission.
        #[must_use]
        pub fn table(mut self, table: &str, permission: ResourcePermission) -> Self {
            self.tables.insert(table.to_string(), permission);
            self
        }

        /// Adds a fetchable row.
        #[must_use]
        pub fn row(mut self, table: &str, row: Row) -> Self {
            self.rows.entry(table.to_string()).or_default().push(row);
            self
        }

        /// Adds a group grant to a row.
        #[must_use]
        pub fn grant(mut self, id: ReferenceId, grant: actuate_auth::GroupGrant) -> Self {
            self.grants.entry(id).or_default().push(grant);
            self
        }

        /// Number of row-level calls (`row_permission` + `fetch_rows`).
        pub fn row_level_calls(&self) -> usize {
            self.row_calls.load(Ordering::SeqCst) + self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    impl PermissionLookup for StaticLookup {
        fn table_permission(&self, table: &str) -> Result<ResourcePermission, StoreError> {
            self.table_calls.fetch_add(1, Ordering::SeqCst);
            self.tables
                .get(table)
                .cloned()
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
        }

        fn row_permission(&self, _table: &str, row: &Row) -> Result<ResourcePermission, StoreError> {
            self.row_calls.fetch_add(1, Ordering::SeqCst);
            let owner = owner_of(row);
            let permission = row
                .get(column::PERMISSION)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            let groups = reference_id_of(row)
                .and_then(|id| self.grants.get(&id).cloned())
                .unwrap_or_default();
            Ok(ResourcePermission {
                owner,
                permission,
                groups,
            })
        }

        fn fetch_rows(&self, table: &str, ids: &[ReferenceId]) -> Result<Vec<Row>, StoreError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .get(table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| reference_id_of(row).is_some_and(|id| ids.contains(&id)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockInterceptor, StaticLookup};
    use super::*;
    use crate::Verb;
    use actuate_auth::Actor;
    use actuate_types::Row;
    use serde_json::json;

    fn ctx() -> InterceptContext {
        InterceptContext::new(InterceptPoint::before(Verb::Create), "note", Actor::guest())
    }

    #[test]
    fn mock_pass_through() {
        let mock = MockInterceptor::pass_through("m", InterceptPoint::before(Verb::Create));
        let action = mock.intercept(ctx(), &StaticLookup::new());
        assert!(action.is_continue());
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn mock_modifier_edits_rows() {
        let mock = MockInterceptor::modifier("m", InterceptPoint::before(Verb::Create), |ctx| {
            ctx.rows.push(Row::new());
        });
        match mock.intercept(ctx(), &StaticLookup::new()) {
            InterceptAction::Continue(ctx) => assert_eq!(ctx.rows.len(), 1),
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn mock_short_circuit() {
        let mock = MockInterceptor::short_circuit(
            "m",
            InterceptPoint::before(Verb::Create),
            json!({"cached": true}),
        );
        match mock.intercept(ctx(), &StaticLookup::new()) {
            InterceptAction::ShortCircuit(value) => assert_eq!(value, json!({"cached": true})),
            other => panic!("expected ShortCircuit, got {other:?}"),
        }
    }

    #[test]
    fn default_priority() {
        let mock = MockInterceptor::pass_through("m", InterceptPoint::before(Verb::Create));
        assert_eq!(mock.priority(), 100);
        assert_eq!(mock.with_priority(5).priority(), 5);
    }
}
