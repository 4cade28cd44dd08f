//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use actuate_auth::{Capability, PermissionValue};
use actuate_script::ScriptLimits;
use actuate_types::GroupId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure, after merging all layers.
///
/// ```
/// use actuate_action::config::ActuateConfig;
///
/// let config = ActuateConfig::from_toml("[script]\ntime_budget_ms = 50").expect("parse");
/// assert_eq!(config.script.time_budget_ms, 50);
/// assert_eq!(config.script.max_instructions, 1_000_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActuateConfig {
    /// Permission defaults.
    pub auth: AuthConfig,

    /// Script sandbox limits.
    pub script: ScriptConfig,

    /// Schema upload handling.
    pub schema: SchemaConfig,

    /// Password reset tokens and mail.
    pub password_reset: PasswordResetConfig,
}

impl ActuateConfig {
    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        self.auth.merge(&other.auth);
        self.script.merge(&other.script);
        self.schema.merge(&other.schema);
        self.password_reset.merge(&other.password_reset);
    }
}

/// Permission defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Members of this group bypass every permission check.
    pub admin_group: Option<GroupId>,

    /// Permission stamped on rows created without one.
    pub default_row_permission: PermissionValue,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_group: None,
            default_row_permission: PermissionValue::new(
                Capability::ALL,
                Capability::PEEK | Capability::READ,
                Capability::empty(),
            ),
        }
    }
}

impl AuthConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.admin_group.is_some() {
            self.admin_group = other.admin_group;
        }
        if other.default_row_permission != default.default_row_permission {
            self.default_row_permission = other.default_row_permission;
        }
    }
}

/// Script sandbox limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptConfig {
    /// Maximum Lua VM instructions per evaluation.
    pub max_instructions: u64,

    /// Wall-clock budget per evaluation in milliseconds.
    pub time_budget_ms: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_instructions: 1_000_000,
            time_budget_ms: 250,
        }
    }
}

impl ScriptConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.max_instructions != default.max_instructions {
            self.max_instructions = other.max_instructions;
        }
        if other.time_budget_ms != default.time_budget_ms {
            self.time_budget_ms = other.time_budget_ms;
        }
    }

    /// Sandbox limits for the resolver.
    #[must_use]
    pub fn limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_instructions: self.max_instructions,
            time_budget: Duration::from_millis(self.time_budget_ms),
        }
    }
}

/// Schema upload handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directory uploaded schema files are written to.
    pub upload_dir: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./schema"),
        }
    }
}

impl SchemaConfig {
    fn merge(&mut self, other: &Self) {
        if other.upload_dir != Self::default().upload_dir {
            self.upload_dir = other.upload_dir.clone();
        }
    }
}

/// Password reset tokens and mail.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordResetConfig {
    /// Token signing secret. Empty means a random per-process secret.
    pub secret: String,

    /// Token lifetime.
    pub token_ttl_minutes: i64,

    /// Mail sender address.
    pub sender: String,

    /// Mail subject prefix; the account email is appended.
    pub subject: String,
}

impl Default for PasswordResetConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_minutes: 30,
            sender: "no-reply@localhost".into(),
            subject: "Reset password for account".into(),
        }
    }
}

impl PasswordResetConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if !other.secret.is_empty() {
            self.secret = other.secret.clone();
        }
        if other.token_ttl_minutes != default.token_ttl_minutes {
            self.token_ttl_minutes = other.token_ttl_minutes;
        }
        if other.sender != default.sender {
            self.sender = other.sender.clone();
        }
        if other.subject != default.subject {
            self.subject = other.subject.clone();
        }
    }
}

impl std::fmt::Debug for PasswordResetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("sender", &self.sender)
            .field("subject", &self.subject)
            .finish()
    }
}
