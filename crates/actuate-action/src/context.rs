//! Per-invocation request context.

use crate::ActionResponse;
use actuate_types::Row;
use serde_json::Value;
use tracing::debug;

/// Key holding the subject row.
pub const SUBJECT_KEY: &str = "subject";
/// Key holding the actor's profile row.
pub const USER_KEY: &str = "user";
/// Key holding the raw request attributes.
pub const ATTRIBUTES_KEY: &str = "attributes";

/// The mutable map templates resolve against.
///
/// Created fresh for one invocation and dropped with it. Each outcome with
/// a `reference` adds its result:
///
/// ```
/// use actuate_action::RequestContext;
/// use serde_json::json;
///
/// let mut ctx = RequestContext::new();
/// ctx.store_result("r", &json!([{"field": "a"}, {"field": "b"}]));
///
/// assert_eq!(ctx.get("r[1]"), Some(&json!({"field": "b"})));
/// assert_eq!(ctx.get("r").and_then(|v| v.as_array()).map(Vec::len), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    values: Row,
}

impl RequestContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Reads a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether a key is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The underlying map, as handed to the resolver.
    #[must_use]
    pub fn as_map(&self) -> &Row {
        &self.values
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stores an outcome result under `reference`.
    ///
    /// A list is stored both whole and as `reference[i]` entries; anything
    /// else is stored directly.
    pub fn store_result(&mut self, reference: &str, result: &Value) {
        if let Value::Array(items) = result {
            for (i, item) in items.iter().enumerate() {
                self.values.insert(format!("{reference}[{i}]"), item.clone());
            }
        }
        self.values.insert(reference.to_string(), result.clone());
        debug!(reference, "stored outcome result");
    }

    /// Stores the attributes of an outcome's responses under `reference`.
    ///
    /// Used when a step produced responses but no result value.
    pub fn store_responses(&mut self, reference: &str, responses: &[ActionResponse]) {
        let list = Value::Array(responses.iter().map(|r| r.attributes.clone()).collect());
        self.store_result(reference, &list);
    }

    /// Consumes the context.
    #[must_use]
    pub fn into_inner(self) -> Row {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_stored_directly() {
        let mut ctx = RequestContext::new();
        ctx.store_result("user", &json!({"name": "Bob"}));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("user"), Some(&json!({"name": "Bob"})));
    }

    #[test]
    fn list_stored_with_indexed_entries() {
        let mut ctx = RequestContext::new();
        ctx.store_result("r", &json!([1, 2]));
        assert_eq!(ctx.get("r[0]"), Some(&json!(1)));
        assert_eq!(ctx.get("r[1]"), Some(&json!(2)));
        assert_eq!(ctx.get("r"), Some(&json!([1, 2])));
        assert!(!ctx.contains("r[2]"));
    }

    #[test]
    fn responses_stored_as_attribute_list() {
        let mut ctx = RequestContext::new();
        ctx.store_responses("n", &[ActionResponse::notify("success", "Success", "ok")]);
        assert_eq!(ctx.get("n[0]").and_then(|v| v.get("type")), Some(&json!("success")));
    }
}
