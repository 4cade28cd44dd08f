//! Core types for actuate.
//!
//! Foundational pieces shared by every crate in the workspace:
//!
//! - [`ReferenceId`] and [`GroupId`]: UUID-backed identifiers for stored rows
//!   and user groups
//! - [`Row`] and the well-known column names in [`column`]
//! - [`StoreError`]: the failure contract of the storage collaborator
//! - [`ErrorCode`]: machine-readable codes for boundary errors
//!
//! # Crate Architecture
//!
//! ```text
//! actuate-types    ids, Row, StoreError, ErrorCode   <- HERE
//!      |
//! actuate-auth     capabilities, tiers, policy
//!      |
//! actuate-hook     interceptor chain, access gates
//! actuate-script   templates, sandboxed Lua
//!      |
//! actuate-action   dispatcher, performers, store, config
//!      |
//! actuate-cli      binary
//! ```

mod error;
mod id;
mod row;

pub use error::{assert_error_code, ErrorCode, StoreError};
pub use id::{GroupId, IdParseError, ReferenceId};
pub use row::{column, owner_of, reference_id_of, render_text, Row};
