//! Default ownership for created rows.

use actuate_auth::PermissionValue;
use actuate_hook::{
    InterceptAction, InterceptContext, InterceptPoint, Interceptor, PermissionLookup, TablePattern,
    Verb,
};
use actuate_types::column;
use serde_json::Value;

/// Fills `owner_id` and `permission` on rows about to be created.
///
/// Columns the row already carries are left alone. Guests leave
/// `owner_id` unset.
pub struct OwnerStamp {
    permission: PermissionValue,
    pattern: TablePattern,
}

impl OwnerStamp {
    /// Interceptor ID.
    pub const ID: &'static str = "owner-stamp";
    /// Runs after both access gates.
    pub const PRIORITY: i32 = 30;

    /// Stamps rows with `permission` when they carry none.
    #[must_use]
    pub fn new(permission: PermissionValue) -> Self {
        Self {
            permission,
            pattern: TablePattern::Any,
        }
    }
}

impl Interceptor for OwnerStamp {
    fn id(&self) -> &str {
        Self::ID
    }

    fn pattern(&self) -> &TablePattern {
        &self.pattern
    }

    fn points(&self) -> Vec<InterceptPoint> {
        vec![InterceptPoint::before(Verb::Create)]
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn intercept(&self, mut ctx: InterceptContext, _lookup: &dyn PermissionLookup) -> InterceptAction {
        let owner = ctx.actor.user_id();
        for row in &mut ctx.rows {
            if let Some(owner) = owner {
                row.entry(column::OWNER)
                    .or_insert_with(|| Value::String(owner.to_string()));
            }
            row.entry(column::PERMISSION)
                .or_insert_with(|| Value::from(self.permission.packed()));
        }
        InterceptAction::proceed(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuate_auth::{Actor, Capability};
    use actuate_hook::interceptor::testing::StaticLookup;
    use actuate_types::{owner_of, ReferenceId, Row};
    use serde_json::json;

    fn stamp(actor: Actor, row: Row) -> Row {
        let permission = PermissionValue::new(Capability::ALL, Capability::READ, Capability::PEEK);
        let ctx = InterceptContext::new(InterceptPoint::before(Verb::Create), "note", actor)
            .with_rows(vec![row]);
        match OwnerStamp::new(permission).intercept(ctx, &StaticLookup::new()) {
            InterceptAction::Continue(ctx) => ctx.rows.into_iter().next().expect("row"),
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn fills_missing_columns() {
        let me = ReferenceId::new();
        let row = stamp(Actor::user(me), Row::new());
        assert_eq!(owner_of(&row), Some(me));
        assert_eq!(
            row[column::PERMISSION],
            json!(PermissionValue::new(Capability::ALL, Capability::READ, Capability::PEEK).packed())
        );
    }

    #[test]
    fn keeps_existing_columns_and_skips_guests() {
        let mut row = Row::new();
        row.insert(column::PERMISSION.into(), json!(7));
        let row = stamp(Actor::guest(), row);
        assert_eq!(row[column::PERMISSION], json!(7));
        assert!(!row.contains_key(column::OWNER));
    }
}
