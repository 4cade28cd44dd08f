//! Configuration errors.

use actuate_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to assemble an [`ActuateConfig`](super::ActuateConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but is unreadable.
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML for [`ActuateConfig`](super::ActuateConfig).
    #[error("invalid config in {path}: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot render config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An `ACTUATE_*` variable holds a malformed value.
    #[error("{name}: {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } => "CONFIG_PARSE_TOML",
            Self::Serialize(_) => "CONFIG_SERIALIZE",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ParseToml { .. } | Self::InvalidEnvVar { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuate_types::assert_error_code;

    #[test]
    fn error_display() {
        let err = ConfigError::invalid_env_var("ACTUATE_SCRIPT_MAX_INSTRUCTIONS", "expected integer");
        assert!(err.to_string().contains("ACTUATE_SCRIPT_MAX_INSTRUCTIONS"));
        assert!(err.to_string().contains("expected integer"));
        assert_error_code(&err, "CONFIG_");
    }
}
