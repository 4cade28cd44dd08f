//! Permission primitives for actuate.
//!
//! Every stored resource (a table's ownership row, a data row, an action)
//! carries a [`PermissionValue`] packing three tiers of [`Capability`] bits:
//!
//! ```text
//! bits 16..24  owner tier
//! bits  8..16  group tier
//! bits  0..8   world tier
//! ```
//!
//! plus a list of [`GroupGrant`] edges, each with its own permission value.
//! A [`PermissionPolicy`] decides whether an [`Actor`] may exercise a
//! capability on a [`ResourcePermission`]. The shipped [`TieredPolicy`]
//! evaluates with strict precedence:
//!
//! ```text
//! admin group member?      -> allow
//! owner of the resource?   -> owner tier decides
//! shares a granted group?  -> any matching edge's group tier may allow
//! otherwise                -> world tier decides
//! ```
//!
//! Once a tier is selected it is authoritative: an owner whose owner tier
//! lacks a bit is denied even when the world tier would grant it.
//!
//! # Crate Architecture
//!
//! ```text
//! actuate-types  (ReferenceId, GroupId)
//!      ^
//! actuate-auth   (Capability, PermissionValue, Actor, PermissionPolicy)  <- THIS CRATE
//!      ^
//! actuate-hook   (TableAccessGate, RowAccessGate use the policy)
//! ```

pub mod actor;
pub mod capability;
pub mod error;
pub mod grant;
pub mod permission;
pub mod policy;

pub use actor::Actor;
pub use capability::Capability;
pub use error::AccessDenied;
pub use grant::{GroupGrant, ResourcePermission};
pub use permission::{PermissionValue, Tier};
pub use policy::{Decider, PermissionPolicy, TieredPolicy};
