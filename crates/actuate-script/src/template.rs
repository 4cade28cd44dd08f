//! Template trees: the attribute shape an outcome declares.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A recursively nested template.
///
/// String leaves are evaluated by the [`Resolver`](crate::Resolver); every
/// other scalar passes through unchanged. Maps and lists keep their shape.
///
/// ```
/// use actuate_script::Template;
/// use serde_json::json;
///
/// let tpl: Template = serde_json::from_value(json!({
///     "email": "$email",
///     "tags": ["~subject.tag", 3],
/// }))
/// .expect("template");
/// assert!(matches!(tpl, Template::Map(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Template {
    /// A leaf evaluated as a script, path or interpolation.
    Text(String),
    /// Ordered list of templates.
    List(Vec<Template>),
    /// Keyed templates.
    Map(BTreeMap<String, Template>),
    /// A non-string scalar (number, bool, null) passed through as-is.
    Literal(Value),
}

impl Template {
    /// An empty map template.
    #[must_use]
    pub fn empty() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Returns `true` for text leaves.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Text of a leaf, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl<K: Into<String>, V: Into<Template>> FromIterator<(K, V)> for Template {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untagged_shapes() {
        let tpl: Template =
            serde_json::from_value(json!(["$a", {"k": true}, null, 2])).expect("template");
        let Template::List(items) = tpl else {
            panic!("expected list");
        };
        assert_eq!(items[0], Template::Text("$a".into()));
        assert!(matches!(items[1], Template::Map(_)));
        assert_eq!(items[2], Template::Literal(Value::Null));
        assert_eq!(items[3], Template::Literal(json!(2)));
    }

    #[test]
    fn collects_from_pairs() {
        let tpl: Template = [("type", "success"), ("message", "!reset.sent")]
            .into_iter()
            .collect();
        let Template::Map(map) = tpl else {
            panic!("expected map");
        };
        assert_eq!(map["message"].as_text(), Some("!reset.sent"));
    }

    #[test]
    fn serializes_back_to_plain_json() {
        let tpl: Template = [("a", "$x")].into_iter().collect();
        assert_eq!(serde_json::to_value(&tpl).expect("serialize"), json!({"a": "$x"}));
    }
}
