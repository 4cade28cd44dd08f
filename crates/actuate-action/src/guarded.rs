//! CRUD verbs wrapped by the interceptor chain.
//!
//! ```text
//! before-chain -> store verb -> after-chain
//!      |                            |
//!      +-- Abort -> HandlerError    +-- Abort -> HandlerError
//!      +-- ShortCircuit -> result   +-- ShortCircuit -> replaces result
//! ```

use crate::{HandlerError, ListQuery, Transaction};
use actuate_auth::Actor;
use actuate_hook::{InterceptAction, InterceptContext, InterceptPoint, InterceptorChain, Verb};
use actuate_types::{column, ReferenceId, Row, StoreError};
use serde_json::Value;
use tracing::trace;

/// Result of one chain pass.
enum Pass {
    Proceed(InterceptContext),
    Done(Value),
}

/// A transaction whose verbs run through the interceptor chain as `actor`.
pub struct GuardedTransaction<'a> {
    tx: &'a mut dyn Transaction,
    chain: &'a InterceptorChain,
    actor: &'a Actor,
}

impl<'a> GuardedTransaction<'a> {
    /// Wraps a transaction.
    pub fn new(tx: &'a mut dyn Transaction, chain: &'a InterceptorChain, actor: &'a Actor) -> Self {
        Self { tx, chain, actor }
    }

    fn context(&self, verb: Verb, table: &str) -> InterceptContext {
        InterceptContext::new(InterceptPoint::before(verb), table, self.actor.clone())
    }

    fn pass(&self, ctx: InterceptContext) -> Result<Pass, HandlerError> {
        trace!(point = %ctx.point, table = %ctx.table, "dispatching chain");
        match self.chain.dispatch(ctx, self.tx.as_lookup()) {
            InterceptAction::Continue(ctx) => Ok(Pass::Proceed(*ctx)),
            InterceptAction::ShortCircuit(value) => Ok(Pass::Done(value)),
            InterceptAction::Abort(err) => Err(err.into()),
        }
    }

    /// Inserts a row. Returns the stored row as an object.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when an interceptor aborts or the store fails.
    pub fn create(&mut self, table: &str, row: Row) -> Result<Value, HandlerError> {
        let ctx = self.context(Verb::Create, table).with_rows(vec![row]);
        let ctx = match self.pass(ctx)? {
            Pass::Proceed(ctx) => ctx,
            Pass::Done(value) => return Ok(value),
        };

        let Some(row) = ctx.rows.first().cloned() else {
            return Ok(Value::Null);
        };
        let created = self.tx.create(table, row)?;

        let after = ctx.advance(InterceptPoint::after(Verb::Create), vec![created]);
        match self.pass(after)? {
            Pass::Proceed(ctx) => Ok(first_or_null(ctx.rows)),
            Pass::Done(value) => Ok(value),
        }
    }

    /// Lists rows. Returns an array of the rows the actor may read.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when an interceptor aborts or the store fails.
    pub fn read_list(&mut self, query: &ListQuery) -> Result<Value, HandlerError> {
        let ctx = self.context(Verb::ReadAll, &query.table);
        let ctx = match self.pass(ctx)? {
            Pass::Proceed(ctx) => ctx,
            Pass::Done(value) => return Ok(value),
        };

        let rows = self.tx.read_list(query)?;
        let after = ctx.advance(InterceptPoint::after(Verb::ReadAll), rows);
        match self.pass(after)? {
            Pass::Proceed(ctx) => Ok(Value::Array(ctx.rows.into_iter().map(Value::Object).collect())),
            Pass::Done(value) => Ok(value),
        }
    }

    /// Fetches one row.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when an interceptor aborts or the row does
    /// not exist.
    pub fn read_one(&mut self, table: &str, id: ReferenceId) -> Result<Value, HandlerError> {
        let ctx = self.context(Verb::ReadOne, table).with_targets(vec![id]);
        let ctx = match self.pass(ctx)? {
            Pass::Proceed(ctx) => ctx,
            Pass::Done(value) => return Ok(value),
        };

        let row = self.tx.read_one(table, id)?;
        let after = ctx.advance(InterceptPoint::after(Verb::ReadOne), vec![row]);
        match self.pass(after)? {
            Pass::Proceed(ctx) => match ctx.rows.into_iter().next() {
                Some(row) => Ok(Value::Object(row)),
                None => Err(StoreError::not_found(table, id).into()),
            },
            Pass::Done(value) => Ok(value),
        }
    }

    /// Applies `changes` to the row `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when an interceptor aborts or the store fails.
    pub fn update(&mut self, table: &str, id: ReferenceId, changes: Row) -> Result<Value, HandlerError> {
        let ctx = self.context(Verb::Update, table).with_targets(vec![id]);
        let ctx = match self.pass(ctx)? {
            Pass::Proceed(ctx) => ctx,
            Pass::Done(value) => return Ok(value),
        };

        let Some(target) = ctx.targets.first().copied() else {
            return Ok(Value::Null);
        };
        let updated = self.tx.update(table, target, changes)?;

        let after = ctx.advance(InterceptPoint::after(Verb::Update), vec![updated]);
        match self.pass(after)? {
            Pass::Proceed(ctx) => Ok(first_or_null(ctx.rows)),
            Pass::Done(value) => Ok(value),
        }
    }

    /// Removes the row `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when an interceptor aborts or the store fails.
    pub fn delete(&mut self, table: &str, id: ReferenceId) -> Result<Value, HandlerError> {
        let ctx = self.context(Verb::Delete, table).with_targets(vec![id]);
        let ctx = match self.pass(ctx)? {
            Pass::Proceed(ctx) => ctx,
            Pass::Done(value) => return Ok(value),
        };

        for target in &ctx.targets {
            self.tx.delete(table, *target)?;
        }

        let after = ctx.advance(InterceptPoint::after(Verb::Delete), Vec::new());
        match self.pass(after)? {
            Pass::Proceed(_) => Ok(Value::Null),
            Pass::Done(value) => Ok(value),
        }
    }
}

fn first_or_null(rows: Vec<Row>) -> Value {
    rows.into_iter().next().map_or(Value::Null, Value::Object)
}

/// Table name recorded on a stored row, if any.
pub(crate) fn row_type(row: &Value) -> Option<&str> {
    row.get(column::TYPE).and_then(Value::as_str)
}
