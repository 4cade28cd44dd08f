//! Interceptor chain for actuate CRUD verbs.
//!
//! Every CRUD verb (create, read-all, read-one, update, delete) is wrapped by
//! ordered **before** and **after** interceptors. The chain is built once at
//! startup and only read afterwards.
//!
//! # Core Concepts
//!
//! ## Intercept Points
//!
//! An [`InterceptPoint`] pairs a [`Verb`] with a [`Phase`]:
//!
//! ```text
//! create.before  create.after
//! read_all.before  read_all.after
//! read_one.before  read_one.after
//! update.before  update.after
//! delete.before  delete.after
//! ```
//!
//! ## Interceptor Trait
//!
//! ```ignore
//! pub trait Interceptor: Send + Sync {
//!     fn id(&self) -> &str;
//!     fn pattern(&self) -> &TablePattern;
//!     fn points(&self) -> Vec<InterceptPoint>;
//!     fn priority(&self) -> i32 { 100 }
//!     fn intercept(&self, ctx: InterceptContext, lookup: &dyn PermissionLookup) -> InterceptAction;
//! }
//! ```
//!
//! ## Intercept Actions
//!
//! - `Continue(ctx)`: pass the (possibly filtered) context on
//! - `ShortCircuit(value)`: stop the chain, `value` becomes the verb's result
//! - `Abort(err)`: stop the chain and fail the verb
//!
//! ## Mandatory Gates
//!
//! [`TableAccessGate`] and [`RowAccessGate`] enforce the permission model.
//! The table gate runs before any row is fetched; the row gate filters
//! candidate rows and aborts when it filters a non-empty set down to nothing.
//!
//! # Example
//!
//! ```
//! use actuate_auth::{Actor, TieredPolicy};
//! use actuate_hook::{
//!     InterceptContext, InterceptPoint, InterceptorChain, Phase, RowAccessGate,
//!     TableAccessGate, Verb,
//! };
//! use actuate_types::GroupId;
//! use std::sync::Arc;
//!
//! let policy = Arc::new(TieredPolicy::new(GroupId::new()));
//! let mut chain = InterceptorChain::new();
//! chain.register(Arc::new(TableAccessGate::new(policy.clone())));
//! chain.register(Arc::new(RowAccessGate::new(policy)));
//!
//! let point = InterceptPoint::new(Verb::Update, Phase::Before);
//! assert_eq!(chain.ids_at(point), vec!["table-access", "row-access"]);
//! ```

mod action;
mod chain;
mod context;
mod error;
mod gates;
pub mod interceptor;
mod lookup;
mod pattern;
mod point;

pub use action::InterceptAction;
pub use chain::InterceptorChain;
pub use context::InterceptContext;
pub use error::InterceptError;
pub use gates::{RowAccessGate, TableAccessGate};
pub use interceptor::Interceptor;
pub use lookup::PermissionLookup;
pub use pattern::TablePattern;
pub use point::{InterceptPoint, Phase, Verb};
