//! Configuration management with hierarchical layering.
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌───────────────────────────────────────────┐
//! │  1. ConfigResolver (CLI flags)            │
//! ├───────────────────────────────────────────┤
//! │  2. Environment Variables (ACTUATE_*)     │
//! ├───────────────────────────────────────────┤
//! │  3. Project Config (.actuate/config.toml) │
//! ├───────────────────────────────────────────┤
//! │  4. Global Config (~/.actuate/config.toml)│
//! ├───────────────────────────────────────────┤
//! │  5. Default Values (compile-time)         │
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `ACTUATE_ADMIN_GROUP` | `auth.admin_group` | UUID |
//! | `ACTUATE_SCRIPT_MAX_INSTRUCTIONS` | `script.max_instructions` | u64 |
//! | `ACTUATE_SCRIPT_TIME_BUDGET_MS` | `script.time_budget_ms` | u64 |
//! | `ACTUATE_SCHEMA_UPLOAD_DIR` | `schema.upload_dir` | PathBuf |
//! | `ACTUATE_RESET_SECRET` | `password_reset.secret` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! [auth]
//! admin_group = "6f1c2b9e-3f7a-4a53-9d0e-2b1f0c7d8e11"
//! default_row_permission = { owner = "all", group = "peek|read" }
//!
//! [script]
//! max_instructions = 1000000
//! time_budget_ms = 250
//!
//! [schema]
//! upload_dir = "./schema"
//!
//! [password_reset]
//! secret = "change-me"
//! token_ttl_minutes = 30
//! sender = "no-reply@example.com"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{ActuateConfig, AuthConfig, PasswordResetConfig, SchemaConfig, ScriptConfig};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".actuate")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".actuate";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
