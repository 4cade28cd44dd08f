//! Mandatory access gates.
//!
//! ```text
//! before:  table-access (10) -> row-access (20, update/delete only)
//! verb
//! after:   row-access (20, create/read_all/read_one)
//! ```
//!
//! The table gate reads only the table's ownership row, so a denied verb
//! never reaches a row fetch.

use crate::{
    InterceptAction, InterceptContext, InterceptError, InterceptPoint, Interceptor,
    PermissionLookup, TablePattern, Verb,
};
use actuate_auth::{AccessDenied, Capability, PermissionPolicy};
use actuate_types::reference_id_of;
use std::sync::Arc;
use tracing::{debug, warn};

/// Table-level gate in front of every verb.
///
/// GET verbs require READ on the table's ownership row; every write
/// requires WRITE.
pub struct TableAccessGate {
    policy: Arc<dyn PermissionPolicy>,
    pattern: TablePattern,
}

impl TableAccessGate {
    /// Interceptor ID.
    pub const ID: &'static str = "table-access";
    /// Priority; runs before every other interceptor.
    pub const PRIORITY: i32 = 10;

    /// Creates the gate.
    pub fn new(policy: Arc<dyn PermissionPolicy>) -> Self {
        Self {
            policy,
            pattern: TablePattern::Any,
        }
    }

    /// Capability the verb requires on the table.
    #[must_use]
    pub fn required(verb: Verb) -> Capability {
        if verb.is_read() {
            Capability::READ
        } else {
            Capability::WRITE
        }
    }
}

impl Interceptor for TableAccessGate {
    fn id(&self) -> &str {
        Self::ID
    }

    fn pattern(&self) -> &TablePattern {
        &self.pattern
    }

    fn points(&self) -> Vec<InterceptPoint> {
        Verb::ALL.into_iter().map(InterceptPoint::before).collect()
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn intercept(&self, ctx: InterceptContext, lookup: &dyn PermissionLookup) -> InterceptAction {
        if self.policy.is_admin(&ctx.actor) {
            return InterceptAction::proceed(ctx);
        }

        let required = Self::required(ctx.point.verb);
        let resource = match lookup.table_permission(&ctx.table) {
            Ok(resource) => resource,
            Err(err) => return InterceptAction::Abort(InterceptError::lookup(&ctx.table, err)),
        };

        if self.policy.can_do(required, &ctx.actor, &resource) {
            InterceptAction::proceed(ctx)
        } else {
            warn!(
                table = %ctx.table,
                verb = %ctx.point.verb,
                method = ctx.point.verb.http_method(),
                capability = %required,
                user = ?ctx.actor.user_id(),
                "table access denied"
            );
            InterceptAction::Abort(
                AccessDenied::Table {
                    table: ctx.table,
                    required,
                }
                .into(),
            )
        }
    }
}

/// Row-level gate.
///
/// Before update/delete it filters the addressed rows; after
/// create/read_all/read_one it filters the returned rows. A non-empty
/// candidate set filtered down to nothing aborts the verb.
pub struct RowAccessGate {
    policy: Arc<dyn PermissionPolicy>,
    pattern: TablePattern,
}

impl RowAccessGate {
    /// Interceptor ID.
    pub const ID: &'static str = "row-access";
    /// Priority; runs right after the table gate.
    pub const PRIORITY: i32 = 20;

    /// Creates the gate.
    pub fn new(policy: Arc<dyn PermissionPolicy>) -> Self {
        Self {
            policy,
            pattern: TablePattern::Any,
        }
    }

    /// Capability each row must grant for the verb.
    ///
    /// Verbs acting on a relationship edge only need PEEK on the row.
    #[must_use]
    pub fn required(verb: Verb, relation: bool) -> Capability {
        match verb {
            Verb::ReadAll | Verb::ReadOne => Capability::READ,
            _ if relation => Capability::PEEK,
            Verb::Create => Capability::PEEK,
            Verb::Update => Capability::UPDATE,
            Verb::Delete => Capability::DELETE,
        }
    }
}

impl Interceptor for RowAccessGate {
    fn id(&self) -> &str {
        Self::ID
    }

    fn pattern(&self) -> &TablePattern {
        &self.pattern
    }

    fn points(&self) -> Vec<InterceptPoint> {
        vec![
            InterceptPoint::before(Verb::Update),
            InterceptPoint::before(Verb::Delete),
            InterceptPoint::after(Verb::Create),
            InterceptPoint::after(Verb::ReadAll),
            InterceptPoint::after(Verb::ReadOne),
        ]
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn intercept(&self, mut ctx: InterceptContext, lookup: &dyn PermissionLookup) -> InterceptAction {
        if self.policy.is_admin(&ctx.actor) {
            return InterceptAction::proceed(ctx);
        }

        if ctx.point.is_before() && ctx.rows.is_empty() && !ctx.targets.is_empty() {
            match lookup.fetch_rows(&ctx.table, &ctx.targets) {
                Ok(rows) => ctx.rows = rows,
                Err(err) => return InterceptAction::Abort(InterceptError::lookup(&ctx.table, err)),
            }
        }

        let candidates = ctx.rows.len();
        if candidates == 0 {
            return InterceptAction::proceed(ctx);
        }

        let required = Self::required(ctx.point.verb, ctx.relation);
        let mut allowed = Vec::with_capacity(candidates);
        for row in std::mem::take(&mut ctx.rows) {
            let resource = match lookup.row_permission(&ctx.table, &row) {
                Ok(resource) => resource,
                Err(err) => return InterceptAction::Abort(InterceptError::lookup(&ctx.table, err)),
            };
            if self.policy.can_do(required, &ctx.actor, &resource) {
                allowed.push(row);
            }
        }

        if allowed.is_empty() {
            warn!(
                table = %ctx.table,
                point = %ctx.point,
                capability = %required,
                candidates,
                user = ?ctx.actor.user_id(),
                "row access denied"
            );
            return InterceptAction::Abort(
                AccessDenied::Rows {
                    table: ctx.table,
                    required,
                    candidates,
                }
                .into(),
            );
        }

        if allowed.len() < candidates {
            debug!(
                table = %ctx.table,
                point = %ctx.point,
                kept = allowed.len(),
                candidates,
                "row gate filtered rows"
            );
        }

        if ctx.point.is_before() {
            ctx.targets = allowed.iter().filter_map(reference_id_of).collect();
        }
        ctx.rows = allowed;
        InterceptAction::proceed(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::testing::StaticLookup;
    use actuate_auth::{Actor, PermissionValue, ResourcePermission, TieredPolicy};
    use actuate_types::{column, GroupId, ReferenceId, Row};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn policy() -> Arc<dyn PermissionPolicy> {
        Arc::new(TieredPolicy::new(GroupId::new()))
    }

    fn world(cap: Capability) -> PermissionValue {
        PermissionValue::new(Capability::ALL, Capability::empty(), cap)
    }

    fn row(owner: ReferenceId, permission: PermissionValue) -> (ReferenceId, Row) {
        let id = ReferenceId::new();
        let mut row = Row::new();
        row.insert(column::REFERENCE_ID.into(), json!(id.to_string()));
        row.insert(column::OWNER.into(), json!(owner.to_string()));
        row.insert(column::PERMISSION.into(), json!(permission.packed()));
        (id, row)
    }

    #[test]
    fn table_gate_read_requires_read() {
        let gate = TableAccessGate::new(policy());
        let lookup = StaticLookup::new().table(
            "note",
            ResourcePermission::new(None, world(Capability::PEEK)),
        );
        let ctx = InterceptContext::new(InterceptPoint::before(Verb::ReadAll), "note", Actor::guest());

        match gate.intercept(ctx, &lookup) {
            InterceptAction::Abort(InterceptError::Denied(AccessDenied::Table { required, .. })) => {
                assert_eq!(required, Capability::READ);
            }
            other => panic!("expected table denial, got {other:?}"),
        }
    }

    #[test]
    fn table_gate_writes_require_write() {
        for verb in [Verb::Create, Verb::Update, Verb::Delete] {
            assert_eq!(TableAccessGate::required(verb), Capability::WRITE);
        }
        let gate = TableAccessGate::new(policy());
        let lookup = StaticLookup::new().table(
            "note",
            ResourcePermission::new(None, world(Capability::UPDATE)),
        );
        let ctx = InterceptContext::new(InterceptPoint::before(Verb::Create), "note", Actor::guest());
        assert!(gate.intercept(ctx, &lookup).is_continue());
    }

    #[test]
    fn table_gate_admin_skips_lookup() {
        let admin_group = GroupId::new();
        let gate = TableAccessGate::new(Arc::new(TieredPolicy::new(admin_group)));
        let lookup = StaticLookup::new();
        let ctx = InterceptContext::new(
            InterceptPoint::before(Verb::Delete),
            "missing",
            Actor::guest().as_administrator(),
        );
        assert!(gate.intercept(ctx, &lookup).is_continue());
        assert_eq!(lookup.table_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn table_gate_unknown_table_is_lookup_error() {
        let gate = TableAccessGate::new(policy());
        let ctx = InterceptContext::new(InterceptPoint::before(Verb::ReadOne), "ghost", Actor::guest());
        match gate.intercept(ctx, &StaticLookup::new()) {
            InterceptAction::Abort(InterceptError::Lookup { table, .. }) => assert_eq!(table, "ghost"),
            other => panic!("expected lookup error, got {other:?}"),
        }
    }

    #[test]
    fn row_gate_capabilities() {
        assert_eq!(RowAccessGate::required(Verb::ReadAll, false), Capability::READ);
        assert_eq!(RowAccessGate::required(Verb::ReadOne, true), Capability::READ);
        assert_eq!(RowAccessGate::required(Verb::Update, false), Capability::UPDATE);
        assert_eq!(RowAccessGate::required(Verb::Delete, false), Capability::DELETE);
        assert_eq!(RowAccessGate::required(Verb::Delete, true), Capability::PEEK);
        assert_eq!(RowAccessGate::required(Verb::Create, false), Capability::PEEK);
    }

    #[test]
    fn row_gate_filters_targets_before_update() {
        let me = ReferenceId::new();
        let (mine, my_row) = row(me, world(Capability::empty()));
        let (theirs, their_row) = row(ReferenceId::new(), world(Capability::empty()));
        let lookup = StaticLookup::new().row("note", my_row).row("note", their_row);

        let gate = RowAccessGate::new(policy());
        let ctx = InterceptContext::new(InterceptPoint::before(Verb::Update), "note", Actor::user(me))
            .with_targets(vec![mine, theirs]);

        match gate.intercept(ctx, &lookup) {
            InterceptAction::Continue(ctx) => {
                assert_eq!(ctx.targets, vec![mine]);
                assert_eq!(ctx.rows.len(), 1);
            }
            other => panic!("expected Continue, got {other:?}"),
        }
        assert_eq!(lookup.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn row_gate_aborts_when_everything_is_filtered() {
        let (id, r) = row(ReferenceId::new(), world(Capability::READ));
        let lookup = StaticLookup::new().row("note", r);
        let gate = RowAccessGate::new(policy());
        let ctx = InterceptContext::new(InterceptPoint::before(Verb::Delete), "note", Actor::guest())
            .with_targets(vec![id]);

        match gate.intercept(ctx, &lookup) {
            InterceptAction::Abort(InterceptError::Denied(AccessDenied::Rows { candidates, required, .. })) => {
                assert_eq!(candidates, 1);
                assert_eq!(required, Capability::DELETE);
            }
            other => panic!("expected row denial, got {other:?}"),
        }
    }

    #[test]
    fn row_gate_empty_result_passes() {
        let gate = RowAccessGate::new(policy());
        let ctx = InterceptContext::new(InterceptPoint::after(Verb::ReadAll), "note", Actor::guest());
        assert!(gate.intercept(ctx, &StaticLookup::new()).is_continue());
    }

    #[test]
    fn row_gate_filters_read_results() {
        let (_, visible) = row(ReferenceId::new(), world(Capability::READ));
        let (_, hidden) = row(ReferenceId::new(), world(Capability::PEEK));
        let gate = RowAccessGate::new(policy());
        let ctx = InterceptContext::new(InterceptPoint::after(Verb::ReadAll), "note", Actor::guest())
            .with_rows(vec![visible.clone(), hidden]);

        match gate.intercept(ctx, &StaticLookup::new()) {
            InterceptAction::Continue(ctx) => assert_eq!(ctx.rows, vec![visible]),
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn row_gate_admin_fast_path() {
        let (_, hidden) = row(ReferenceId::new(), PermissionValue::NONE);
        let lookup = StaticLookup::new();
        let gate = RowAccessGate::new(policy());
        let ctx = InterceptContext::new(
            InterceptPoint::after(Verb::ReadOne),
            "note",
            Actor::guest().as_administrator(),
        )
        .with_rows(vec![hidden]);

        assert!(gate.intercept(ctx, &lookup).is_continue());
        assert_eq!(lookup.row_level_calls(), 0);
    }
}
