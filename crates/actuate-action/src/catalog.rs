//! Action definitions keyed by `(type, name)`.

use crate::ActionDefinition;
use actuate_types::ErrorCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Catalog loading error.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file could not be read.
    #[error("failed to read catalog '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON.
    #[error("failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid TOML.
    #[error("failed to parse catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Neither `.json` nor `.toml`.
    #[error("unsupported catalog format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Two definitions share a `(type, name)`.
    #[error("duplicate action {on_type}.{name}")]
    Duplicate { on_type: String, name: String },
}

impl ErrorCode for CatalogError {
    fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CATALOG_READ",
            Self::Json(_) => "CATALOG_JSON",
            Self::Toml(_) => "CATALOG_TOML",
            Self::UnsupportedFormat(_) => "CATALOG_UNSUPPORTED_FORMAT",
            Self::Duplicate { .. } => "CATALOG_DUPLICATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    List(Vec<ActionDefinition>),
    Wrapped { actions: Vec<ActionDefinition> },
}

#[derive(Deserialize)]
struct TomlCatalog {
    #[serde(default)]
    action: Vec<ActionDefinition>,
}

/// Every known action. Built once, read-only afterwards.
///
/// ```
/// use actuate_action::ActionCatalog;
///
/// let catalog = ActionCatalog::from_json_str(r#"[
///     {"type": "user_account", "name": "signup", "out_fields": []}
/// ]"#).expect("catalog");
///
/// assert!(catalog.get("user_account", "signup").is_some());
/// assert!(catalog.get("user_account", "signin").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    actions: HashMap<(String, String), ActionDefinition>,
}

impl ActionCatalog {
    /// Builds a catalog from definitions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Duplicate`] when two definitions share a
    /// `(type, name)`.
    pub fn new(definitions: impl IntoIterator<Item = ActionDefinition>) -> Result<Self, CatalogError> {
        let mut actions = HashMap::new();
        for definition in definitions {
            let key = (definition.on_type.clone(), definition.name.clone());
            if actions.contains_key(&key) {
                return Err(CatalogError::Duplicate {
                    on_type: key.0,
                    name: key.1,
                });
            }
            debug!(table = %key.0, action = %key.1, "action registered");
            actions.insert(key, definition);
        }
        Ok(Self { actions })
    }

    /// Parses a JSON list of definitions, or an object with an `actions`
    /// list.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on bad JSON or duplicates.
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let definitions = match serde_json::from_str::<JsonCatalog>(text)? {
            JsonCatalog::List(list) => list,
            JsonCatalog::Wrapped { actions } => actions,
        };
        Self::new(definitions)
    }

    /// Parses TOML with one `[[action]]` table per definition.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on bad TOML or duplicates.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let parsed: TomlCatalog = toml::from_str(text)?;
        Self::new(parsed.action)
    }

    /// Loads a `.json` or `.toml` file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("toml") => Self::from_toml_str(&text)?,
            _ => return Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        };
        info!(path = %path.display(), actions = catalog.len(), "action catalog loaded");
        Ok(catalog)
    }

    /// Definition of `name` on `on_type`.
    #[must_use]
    pub fn get(&self, on_type: &str, name: &str) -> Option<&ActionDefinition> {
        self.actions.get(&(on_type.to_string(), name.to_string()))
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All definitions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.values()
    }
}
