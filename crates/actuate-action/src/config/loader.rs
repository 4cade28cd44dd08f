//! Layered configuration loading.
//!
//! ```text
//! defaults ─▶ ~/.actuate/config.toml ─▶ <root>/.actuate/config.toml ─▶ ACTUATE_*
//! ```
//!
//! Later layers win. Absent files are skipped.

use super::{default_config_path, ActuateConfig, ConfigError, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use actuate_types::GroupId;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overwrites `$field` from `$var` when set, via `FromStr`.
macro_rules! parse_env {
    ($field:expr, $var:literal, $expected:literal) => {
        if let Ok(raw) = std::env::var($var) {
            $field = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var($var, $expected))?;
        }
    };
}

/// Builds an [`ActuateConfig`] from defaults, files and the environment.
///
/// ```no_run
/// use actuate_action::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/srv/site")
///     .load()
///     .expect("config");
/// println!("{}", config.schema.upload_dir.display());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global: Option<PathBuf>,
    root: Option<PathBuf>,
    no_env: bool,
    no_global: bool,
    no_project: bool,
}

impl ConfigLoader {
    /// Loader with every layer enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the global layer from `path` instead of `~/.actuate/config.toml`.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global = Some(path.into());
        self
    }

    /// Enables the project layer at `<root>/.actuate/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Ignores `ACTUATE_*` variables.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.no_env = true;
        self
    }

    /// Ignores the global file.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.no_global = true;
        self
    }

    /// Ignores the project file.
    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.no_project = true;
        self
    }

    /// Files to read, lowest priority first.
    fn file_layers(&self) -> Vec<PathBuf> {
        let mut layers = Vec::with_capacity(2);
        if !self.no_global {
            layers.push(self.global.clone().unwrap_or_else(default_config_path));
        }
        if let (false, Some(root)) = (self.no_project, &self.root) {
            layers.push(root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE));
        }
        layers
    }

    /// Merges every enabled layer over the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when a present file cannot be read or parsed, or an
    /// `ACTUATE_*` variable is malformed.
    pub fn load(&self) -> Result<ActuateConfig, ConfigError> {
        let mut config = ActuateConfig::default();
        for path in self.file_layers() {
            if let Some(layer) = read_layer(&path)? {
                debug!(path = %path.display(), "config layer applied");
                config.merge(&layer);
            }
        }
        if !self.no_env {
            apply_env(&mut config)?;
        }
        Ok(config)
    }
}

fn read_layer(path: &Path) -> Result<Option<ActuateConfig>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    ActuateConfig::from_toml(&text)
        .map(Some)
        .map_err(|e| ConfigError::parse_toml(path, e))
}

fn apply_env(config: &mut ActuateConfig) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var("ACTUATE_ADMIN_GROUP") {
        let group: GroupId = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid_env_var("ACTUATE_ADMIN_GROUP", "expected uuid"))?;
        config.auth.admin_group = Some(group);
    }

    parse_env!(config.script.max_instructions, "ACTUATE_SCRIPT_MAX_INSTRUCTIONS", "expected integer");
    parse_env!(config.script.time_budget_ms, "ACTUATE_SCRIPT_TIME_BUDGET_MS", "expected integer");

    if let Ok(dir) = std::env::var("ACTUATE_SCHEMA_UPLOAD_DIR") {
        config.schema.upload_dir = PathBuf::from(dir);
    }
    if let Ok(secret) = std::env::var("ACTUATE_RESET_SECRET") {
        config.password_reset.secret = secret;
    }
    Ok(())
}
