//! Built-in performers.
//!
//! | Name | Performer |
//! |------|-----------|
//! | `password.reset.begin` | [`PasswordResetBegin`] |
//! | `password.reset.verify` | [`PasswordResetVerify`] |
//! | `random.generate` | [`RandomGenerate`] |
//! | `response.create` | [`ResponseCreate`] |
//! | `__become_admin` | [`BecomeAdmin`] |
//! | `__restart` | [`Restart`] |
//! | `site.storage.sync` | [`SiteStorageSync`] |
//!
//! Collaborators the engine cannot provide itself (mail transport, process
//! control, cloud storage) are reached through [`Mailer`],
//! [`SystemControl`] and [`StorageSync`].

mod admin;
mod password;
mod random;
mod response;
mod storage;

pub use admin::{BecomeAdmin, NoSystemControl, Restart, SystemControl};
pub use password::{LogMailer, MailMessage, Mailer, PasswordResetBegin, PasswordResetVerify};
pub use random::RandomGenerate;
pub use response::ResponseCreate;
pub use storage::{SiteStorageSync, StorageSync};

use crate::PerformerError;
use actuate_types::{render_text, Row};
use serde_json::Value;

/// Reads a non-empty attribute as text.
pub(crate) fn required_text(attributes: &Row, name: &str) -> Result<String, PerformerError> {
    match attributes.get(name) {
        None | Some(Value::Null) => Err(PerformerError::MissingAttribute(name.to_string())),
        Some(value) => {
            let text = render_text(value);
            if text.trim().is_empty() {
                Err(PerformerError::MissingAttribute(name.to_string()))
            } else {
                Ok(text)
            }
        }
    }
}

/// Reads an optional attribute as text.
pub(crate) fn optional_text(attributes: &Row, name: &str) -> Option<String> {
    attributes
        .get(name)
        .filter(|v| !v.is_null())
        .map(render_text)
        .filter(|s| !s.is_empty())
}
