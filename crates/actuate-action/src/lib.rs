//! Action execution engine.
//!
//! An action is a named, declarative recipe attached to a table: it
//! extracts and validates input, then runs an ordered list of outcomes.
//! Each outcome is resolved against the request context, routed to a CRUD
//! verb, a named performer or a client response, and may store its result
//! under a reference for later outcomes to read.
//!
//! # Layers
//!
//! ```text
//! ActionEngine            catalog lookup, one transaction per invocation
//!   OutcomeDispatcher     subject/action gates, validation, outcome loop
//!     Resolver            `!`/`:` scripts, `~` paths, `$` interpolation
//!     SystemRoutes        fixed outcome types (notify, restart, schema upload)
//!     GuardedTransaction  CRUD through the InterceptorChain
//!     PerformerRegistry   named extensions (EXECUTE)
//! ```
//!
//! # Example
//!
//! ```
//! use actuate_action::memory::MemoryStore;
//! use actuate_action::{ActionCatalog, ActionEngine, ActionRequest, TokioWorkQueue};
//! use actuate_auth::{Actor, Capability, PermissionValue, ResourcePermission};
//! use std::sync::Arc;
//!
//! let catalog = ActionCatalog::from_json_str(r#"[{
//!     "type": "note",
//!     "name": "hello",
//!     "instance_optional": true,
//!     "out_fields": [{
//!         "type": "client.notify",
//!         "method": "ACTIONRESPONSE",
//!         "attributes": {"type": "success", "message": "Hello $attributes.name"}
//!     }]
//! }]"#).expect("catalog");
//!
//! let store = MemoryStore::new();
//! let anyone = PermissionValue::new(Capability::empty(), Capability::empty(), Capability::EXECUTE);
//! store.set_action_permission("note", "hello", ResourcePermission::new(None, anyone));
//!
//! let runtime = tokio::runtime::Runtime::new().expect("runtime");
//! let engine = ActionEngine::builder(catalog, Arc::new(store), Arc::new(TokioWorkQueue::new(runtime.handle().clone())))
//!     .build();
//!
//! let request = ActionRequest::new("note", "hello").with_attribute("name", "Ada".into());
//! let responses = engine.invoke(&request, &Actor::guest()).expect("invoke");
//! assert_eq!(responses[0].attributes["message"], "Hello Ada");
//! ```

mod catalog;
pub mod config;
mod context;
mod definition;
mod dispatcher;
mod engine;
mod error;
mod guarded;
pub mod memory;
mod performer;
pub mod performers;
mod queue;
mod request;
mod response;
mod stamp;
mod store;
mod system;
mod token;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use catalog::{ActionCatalog, CatalogError};
pub use context::RequestContext;
pub use definition::{ActionDefinition, Field, Method, Outcome, Rule};
pub use dispatcher::{OutcomeDispatcher, BUILD_ERROR};
pub use engine::{ActionEngine, ActionEngineBuilder};
pub use error::{ActionError, ActionFailure, HandlerError, PerformerError, ValidationError};
pub use guarded::GuardedTransaction;
pub use performer::{ActionPerformer, PerformerRegistry, PerformerRegistryBuilder, StepContext, StepOutput};
pub use queue::{Job, JobHandle, JobStatus, TokioWorkQueue, WorkQueue};
pub use request::{ActionRequest, ActionRequestBuilder};
pub use response::{ActionResponse, NOTIFY, REDIRECT};
pub use stamp::OwnerStamp;
pub use store::{ListQuery, QueryFilter, Store, Transaction, QUERY_PARAM};
pub use system::{Route, SchemaUpload, StaticRoute, SystemHandler, SystemRoutes};
pub use token::{ResetClaims, ResetTokenIssuer, TokenError};
