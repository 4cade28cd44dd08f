//! Overrides applied after [`ConfigLoader`](super::ConfigLoader).
//!
//! The CLI implements [`ConfigResolver`] for its flags; embedders can do
//! the same for programmatic settings.

use super::ActuateConfig;

/// Highest-priority configuration layer.
pub trait ConfigResolver {
    /// Writes the values this layer sets. Unset values leave `config`
    /// untouched.
    fn apply(&self, config: &mut ActuateConfig);
}

/// A layer that sets nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut ActuateConfig) {}
}
