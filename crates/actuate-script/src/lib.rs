//! Expression resolution for actuate outcomes.
//!
//! Outcome attributes are [`Template`] trees whose string leaves are
//! evaluated against the request context:
//!
//! | Leaf | Evaluation | Result |
//! |------|------------|--------|
//! | `""` | none | `""` |
//! | `!code`, `:code`, `{{code}}` | Lua in a fresh [`Sandbox`] | native value |
//! | `~a.b` | dotted lookup, empty first segment = `subject` | native value |
//! | anything else | `$a.b` / `$r[0].c` substitution | always a string |
//!
//! Maps and lists keep their shape; every leaf resolves independently.
//!
//! # Example
//!
//! ```
//! use actuate_script::{Resolver, Template};
//! use serde_json::json;
//!
//! let ctx = json!({"subject": {"name": "Bob"}, "count": 2});
//! let ctx = ctx.as_object().expect("object");
//!
//! let tpl: Template = serde_json::from_value(json!({
//!     "greeting": "Hello $subject.name",
//!     "name": "~.name",
//!     "double": "!count * 2",
//! }))
//! .expect("template");
//!
//! let resolved = Resolver::default().resolve(&tpl, ctx).expect("resolve");
//! assert_eq!(
//!     resolved,
//!     json!({"greeting": "Hello Bob", "name": "Bob", "double": 4})
//! );
//! ```

mod convert;
mod error;
pub mod path;
mod resolver;
mod sandbox;
mod template;

pub use error::{ResolveError, ScriptError};
pub use resolver::{LeafKind, Resolver};
pub use sandbox::{Sandbox, ScriptLimits};
pub use template::Template;
