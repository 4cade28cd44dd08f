//! Inbound action requests.

use actuate_types::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// An inbound invocation: which action, on which table, with what input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Table the action is declared on.
    #[serde(rename = "type")]
    pub on_type: String,
    /// Action name.
    pub action: String,
    /// Input attributes.
    #[serde(default)]
    pub attributes: Row,
}

impl ActionRequest {
    /// A request with no attributes.
    #[must_use]
    pub fn new(on_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            on_type: on_type.into(),
            action: action.into(),
            attributes: Row::new(),
        }
    }

    /// Adds one attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Assembles a request from several sources.
    #[must_use]
    pub fn builder(on_type: impl Into<String>, action: impl Into<String>) -> ActionRequestBuilder {
        ActionRequestBuilder {
            on_type: on_type.into(),
            action: action.into(),
            form: Row::new(),
            body: Row::new(),
            path: Row::new(),
        }
    }
}

/// Builds an [`ActionRequest`] from form, body and path sources.
///
/// Precedence on key collision: path > body > form.
///
/// ```
/// use actuate_action::ActionRequest;
/// use serde_json::json;
///
/// let request = ActionRequest::builder("note", "publish")
///     .form("title=from+form&draft=1")
///     .body(r#"{"title": "from body", "tags": ["a"]}"#)
///     .path_param("note_id", "42")
///     .build();
///
/// assert_eq!(request.attributes["title"], json!("from body"));
/// assert_eq!(request.attributes["draft"], json!("1"));
/// assert_eq!(request.attributes["tags"], json!(["a"]));
/// assert_eq!(request.attributes["note_id"], json!("42"));
/// ```
#[derive(Debug, Clone)]
pub struct ActionRequestBuilder {
    on_type: String,
    action: String,
    form: Row,
    body: Row,
    path: Row,
}

impl ActionRequestBuilder {
    /// Adds `application/x-www-form-urlencoded` pairs (query string or form
    /// body). Repeated keys keep the last value.
    #[must_use]
    pub fn form(mut self, encoded: &str) -> Self {
        decode_form(encoded, &mut self.form);
        self
    }

    /// Adds one form pair.
    #[must_use]
    pub fn form_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Adds a request body.
    ///
    /// A JSON object contributes its `attributes` member, when that is an
    /// object, and then its other top-level keys, which win on collision.
    /// Anything else is decoded as form pairs.
    #[must_use]
    pub fn body(mut self, raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(mut object)) => {
                match object.remove("attributes") {
                    Some(Value::Object(attrs)) => self.body.extend(attrs),
                    Some(other) => {
                        object.insert("attributes".into(), other);
                    }
                    None => {}
                }
                self.body.extend(object);
            }
            _ => {
                trace!("body is not a JSON object, decoding as form");
                decode_form(raw, &mut self.body);
            }
        }
        self
    }

    /// Adds a route path parameter.
    #[must_use]
    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Merges the sources.
    #[must_use]
    pub fn build(self) -> ActionRequest {
        let mut attributes = self.form;
        attributes.extend(self.body);
        attributes.extend(self.path);
        ActionRequest {
            on_type: self.on_type,
            action: self.action,
            attributes,
        }
    }
}

fn decode_form(encoded: &str, into: &mut Row) {
    for (key, value) in url::form_urlencoded::parse(encoded.trim().as_bytes()) {
        into.insert(key.into_owned(), Value::String(value.into_owned()));
    }
}
