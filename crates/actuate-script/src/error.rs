//! Error types for template resolution and script evaluation.

use actuate_types::ErrorCode;
use thiserror::Error;

/// A sandboxed script failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The script did not compile.
    #[error("compile error: {0}")]
    Syntax(String),

    /// The script raised an error while running.
    #[error("script error: {0}")]
    Runtime(String),

    /// The instruction count, time budget, memory cap or a string size cap
    /// ran out.
    #[error("script limit exceeded: {0}")]
    LimitExceeded(String),

    /// A value could not cross the Lua/JSON boundary.
    #[error("conversion error: {0}")]
    Conversion(String),
}

impl ScriptError {
    /// Converts an mlua error, unwrapping callback chains.
    pub(crate) fn from_lua(err: &mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => Self::Syntax(message.clone()),
            mlua::Error::RuntimeError(msg) if msg.starts_with(LIMIT_MARKER) => {
                Self::LimitExceeded(msg.trim_start_matches(LIMIT_MARKER).trim().to_string())
            }
            mlua::Error::RuntimeError(msg) => Self::Runtime(msg.clone()),
            mlua::Error::MemoryError(msg) => Self::LimitExceeded(format!("memory: {msg}")),
            mlua::Error::CallbackError { cause, .. } => Self::from_lua(cause),
            mlua::Error::FromLuaConversionError { .. }
            | mlua::Error::ToLuaConversionError { .. }
            | mlua::Error::SerializeError(_)
            | mlua::Error::DeserializeError(_) => Self::Conversion(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Prefix of the runtime error raised by the limit hook.
pub(crate) const LIMIT_MARKER: &str = "limit:";

impl ErrorCode for ScriptError {
    fn code(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SCRIPT_SYNTAX",
            Self::Runtime(_) => "SCRIPT_RUNTIME",
            Self::LimitExceeded(_) => "SCRIPT_LIMIT_EXCEEDED",
            Self::Conversion(_) => "SCRIPT_CONVERSION",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// A template leaf could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A `!`/`:` script failed.
    #[error("failed to evaluate script in {template}: {source}")]
    Script {
        /// The template text.
        template: String,
        /// Script failure.
        #[source]
        source: ScriptError,
    },

    /// A `$` path named a key that does not exist before its last segment.
    #[error("failed to resolve {template}: no value for {key}")]
    MissingKey {
        /// The template text.
        template: String,
        /// Missing segment.
        key: String,
    },

    /// A bracketed index pointed past the end of a list.
    #[error("failed to resolve {template}: index [{index}] is out of range [{len} values]")]
    IndexOutOfRange {
        /// The template text.
        template: String,
        /// Requested index.
        index: usize,
        /// List length.
        len: usize,
    },

    /// A path walked into something that is not a map.
    #[error("failed to resolve {template}: {segment} is not a map")]
    NotAMap {
        /// The template text.
        template: String,
        /// Segment whose value was not a map.
        segment: String,
    },
}

impl ResolveError {
    /// The template text that failed.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            Self::Script { template, .. }
            | Self::MissingKey { template, .. }
            | Self::IndexOutOfRange { template, .. }
            | Self::NotAMap { template, .. } => template,
        }
    }
}

impl ErrorCode for ResolveError {
    fn code(&self) -> &'static str {
        match self {
            Self::Script { .. } => "RESOLVE_SCRIPT",
            Self::MissingKey { .. } => "RESOLVE_MISSING_KEY",
            Self::IndexOutOfRange { .. } => "RESOLVE_INDEX_OUT_OF_RANGE",
            Self::NotAMap { .. } => "RESOLVE_NOT_A_MAP",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
