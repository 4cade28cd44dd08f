//! Fixed behaviors keyed by outcome type.
//!
//! Before an outcome is routed by its method, the dispatcher asks
//! [`SystemRoutes`] whether its type has a system behavior. The defaults:
//!
//! | Outcome type | Route |
//! |--------------|-------|
//! | `client.notify`, `client.redirect`, `client.store.set`, `action.response` | [`Route::Respond`] |
//! | `__become_admin`, `__restart` | [`Route::Execute`] |
//! | `system_json_schema_update` | writes uploads, then [`Route::Execute`] `__restart` |

use crate::{HandlerError, Outcome};
use actuate_types::Row;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an outcome goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Emit the resolved attributes as one response of this type.
    Respond(String),
    /// Run the named performer.
    Execute(String),
    /// Route by the outcome's method.
    Method,
}

/// A system behavior bound to an outcome type.
pub trait SystemHandler: Send + Sync {
    /// Decides the route, possibly acting first or rewriting `attributes`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the behavior itself fails.
    fn route(&self, outcome: &Outcome, attributes: &mut Row) -> Result<Route, HandlerError>;
}

/// Fixed route with no side effect.
#[derive(Debug, Clone)]
pub struct StaticRoute(pub Route);

impl SystemHandler for StaticRoute {
    fn route(&self, outcome: &Outcome, _attributes: &mut Row) -> Result<Route, HandlerError> {
        Ok(match &self.0 {
            Route::Respond(kind) if kind.is_empty() => Route::Respond(outcome.outcome_type.clone()),
            other => other.clone(),
        })
    }
}

/// Outcome type of the schema upload behavior.
pub const SCHEMA_UPDATE: &str = "system_json_schema_update";
/// Performer restarting the service.
pub const RESTART: &str = "__restart";
/// Performer promoting the invoking user.
pub const BECOME_ADMIN: &str = "__become_admin";

/// Attribute holding the uploaded schema files.
const SCHEMA_FILES: &str = "json_schema";

/// Writes uploaded schema files, then restarts.
///
/// Each entry of `json_schema` is `{name, file}` (or `{name, contents}`)
/// where the content is base64, optionally as a data URL.
#[derive(Debug, Clone)]
pub struct SchemaUpload {
    dir: PathBuf,
}

impl SchemaUpload {
    /// Writes into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_entry(&self, entry: &Value) -> Result<Option<PathBuf>, HandlerError> {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::SchemaUpload("file entry without a name".into()))?;
        let Some(content) = entry
            .get("file")
            .or_else(|| entry.get("contents"))
            .and_then(Value::as_str)
        else {
            warn!(file = name, "schema upload entry has no contents");
            return Ok(None);
        };

        let base_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HandlerError::SchemaUpload(format!("bad file name {name}")))?;
        let extension = base_name.rsplit('.').next().unwrap_or(base_name);

        let encoded = content.split_once(',').map_or(content, |(_, data)| data);
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| HandlerError::SchemaUpload(format!("{base_name}: {e}")))?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| HandlerError::SchemaUpload(format!("{}: {e}", self.dir.display())))?;
        let target = self
            .dir
            .join(format!("schema_uploaded_{base_name}_actuate.{extension}"));
        std::fs::write(&target, bytes)
            .map_err(|e| HandlerError::SchemaUpload(format!("{}: {e}", target.display())))?;
        debug!(path = %target.display(), "schema file written");
        Ok(Some(target))
    }
}

impl SystemHandler for SchemaUpload {
    fn route(&self, _outcome: &Outcome, attributes: &mut Row) -> Result<Route, HandlerError> {
        let files = match attributes.get(SCHEMA_FILES) {
            Some(Value::Array(files)) if !files.is_empty() => files,
            _ => return Err(HandlerError::SchemaUpload("no files uploaded".into())),
        };

        let mut written = 0usize;
        for entry in files {
            if self.write_entry(entry)?.is_some() {
                written += 1;
            }
        }
        info!(written, dir = %self.dir.display(), "schema files uploaded, restarting");
        Ok(Route::Execute(RESTART.to_string()))
    }
}

/// Registrable table of system behaviors. Immutable once the engine is
/// built.
#[derive(Clone, Default)]
pub struct SystemRoutes {
    handlers: HashMap<String, Arc<dyn SystemHandler>>,
}

impl SystemRoutes {
    /// An empty table: every outcome routes by method.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default table, with schema uploads written into `upload_dir`.
    #[must_use]
    pub fn with_defaults(upload_dir: impl Into<PathBuf>) -> Self {
        let mut routes = Self::new();
        for kind in ["client.notify", "client.redirect", "client.store.set", "action.response"] {
            routes.register(kind, Arc::new(StaticRoute(Route::Respond(String::new()))));
        }
        for name in [BECOME_ADMIN, RESTART] {
            routes.register(name, Arc::new(StaticRoute(Route::Execute(name.to_string()))));
        }
        routes.register(SCHEMA_UPDATE, Arc::new(SchemaUpload::new(upload_dir)));
        routes
    }

    /// Binds a behavior to an outcome type, replacing any earlier one.
    pub fn register(&mut self, outcome_type: impl Into<String>, handler: Arc<dyn SystemHandler>) {
        let outcome_type = outcome_type.into();
        debug!(outcome = %outcome_type, "system route registered");
        self.handlers.insert(outcome_type, handler);
    }

    /// Behavior bound to an outcome type.
    #[must_use]
    pub fn get(&self, outcome_type: &str) -> Option<&Arc<dyn SystemHandler>> {
        self.handlers.get(outcome_type)
    }

    /// Routes an outcome; unbound types route by method.
    ///
    /// # Errors
    ///
    /// Returns the bound handler's [`HandlerError`].
    pub fn route(&self, outcome: &Outcome, attributes: &mut Row) -> Result<Route, HandlerError> {
        match self.get(&outcome.outcome_type) {
            Some(handler) => handler.route(outcome, attributes),
            None => Ok(Route::Method),
        }
    }
}

impl fmt::Debug for SystemRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("SystemRoutes").field("handlers", &kinds).finish()
    }
}
