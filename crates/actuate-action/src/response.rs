//! User-visible output units.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Response type of client notifications.
pub const NOTIFY: &str = "client.notify";
/// Response type of client redirects.
pub const REDIRECT: &str = "client.redirect";

/// One output unit of an invocation.
///
/// ```
/// use actuate_action::ActionResponse;
///
/// let ok = ActionResponse::notify("success", "Success", "Deleted note");
/// assert_eq!(ok.response_type, "client.notify");
/// assert!(ok.is_notify("success"));
///
/// let json = serde_json::to_value(&ok).expect("serialize");
/// assert_eq!(json["responseType"], "client.notify");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    /// `client.notify`, `client.redirect`, a table name, ...
    pub response_type: String,
    /// Payload.
    pub attributes: Value,
}

impl ActionResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(response_type: impl Into<String>, attributes: Value) -> Self {
        Self {
            response_type: response_type.into(),
            attributes,
        }
    }

    /// A `client.notify` with `type`, `title` and `message`.
    #[must_use]
    pub fn notify(kind: &str, title: &str, message: impl Into<String>) -> Self {
        Self::new(
            NOTIFY,
            json!({"type": kind, "title": title, "message": message.into()}),
        )
    }

    /// A `client.redirect` to `location` in `window` after `delay_ms`.
    #[must_use]
    pub fn redirect(location: &str, window: &str, delay_ms: u64) -> Self {
        Self::new(
            REDIRECT,
            json!({"location": location, "window": window, "delay": delay_ms}),
        )
    }

    /// Whether this is a `client.notify` of the given kind.
    #[must_use]
    pub fn is_notify(&self, kind: &str) -> bool {
        self.response_type == NOTIFY && self.attributes.get("type").and_then(Value::as_str) == Some(kind)
    }
}
