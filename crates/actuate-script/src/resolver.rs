//! Template resolution against the request context.

use crate::path::{interpolate, lookup};
use crate::{ResolveError, Sandbox, ScriptLimits, Template};
use serde_json::{Map, Value};
use tracing::trace;

/// How a text leaf is evaluated, decided by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind<'a> {
    /// Empty text; resolves to `""`.
    Empty,
    /// `!code`, `:code` or `{{code}}`.
    Script(&'a str),
    /// `~a.b`; `~name` and `~.name` read from `subject`.
    Path(&'a str),
    /// Anything else; `$` references are substituted.
    Interpolated(&'a str),
}

impl<'a> LeafKind<'a> {
    /// Classifies a text leaf.
    #[must_use]
    pub fn classify(text: &'a str) -> Self {
        if text.is_empty() {
            return Self::Empty;
        }
        if let Some(code) = text.strip_prefix('!').or_else(|| text.strip_prefix(':')) {
            return Self::Script(code);
        }
        if text.len() > 3 {
            if let Some(code) = text.strip_prefix("{{").and_then(|t| t.strip_suffix("}}")) {
                return Self::Script(code);
            }
        }
        if let Some(path) = text.strip_prefix('~') {
            return Self::Path(path);
        }
        Self::Interpolated(text)
    }
}

/// Resolves [`Template`] trees.
///
/// ```
/// use actuate_script::Resolver;
/// use serde_json::json;
///
/// let ctx = json!({"subject": {"name": "Bob"}});
/// let ctx = ctx.as_object().expect("object");
/// let resolver = Resolver::default();
///
/// assert_eq!(resolver.evaluate("$subject.name", ctx).expect("resolve"), json!("Bob"));
/// assert_eq!(resolver.evaluate("~name", ctx).expect("resolve"), json!("Bob"));
/// assert_eq!(resolver.evaluate("~.name", ctx).expect("resolve"), json!("Bob"));
/// assert_eq!(resolver.evaluate("!1+1", ctx).expect("resolve"), json!(2));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    sandbox: Sandbox,
}

impl Resolver {
    /// Creates a resolver whose scripts run under `limits`.
    #[must_use]
    pub fn new(limits: ScriptLimits) -> Self {
        Self {
            sandbox: Sandbox::new(limits),
        }
    }

    /// The sandbox scripts run in.
    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Resolves a whole template tree.
    ///
    /// Lists keep their order. In maps, a text leaf resolving to `null`
    /// drops its key.
    ///
    /// # Errors
    ///
    /// Returns the first leaf's [`ResolveError`].
    pub fn resolve(
        &self,
        template: &Template,
        ctx: &Map<String, Value>,
    ) -> Result<Value, ResolveError> {
        match template {
            Template::Text(text) => self.evaluate(text, ctx),
            Template::Literal(value) => Ok(value.clone()),
            Template::List(items) => items
                .iter()
                .map(|item| self.resolve(item, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Template::Map(entries) => self.resolve_map(entries, ctx).map(Value::Object),
        }
    }

    /// Resolves a map of templates into a concrete attribute map.
    ///
    /// # Errors
    ///
    /// Returns the first leaf's [`ResolveError`].
    pub fn resolve_map<'t>(
        &self,
        templates: impl IntoIterator<Item = (&'t String, &'t Template)>,
        ctx: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ResolveError> {
        let mut out = Map::new();
        for (key, item) in templates {
            let value = self.resolve(item, ctx)?;
            if value.is_null() && !matches!(item, Template::Literal(_)) {
                continue;
            }
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    /// Evaluates a single text leaf.
    ///
    /// Scripts and `~` paths return native values; interpolation always
    /// returns a string.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the script fails or the path cannot be
    /// walked.
    pub fn evaluate(&self, text: &str, ctx: &Map<String, Value>) -> Result<Value, ResolveError> {
        let value = match LeafKind::classify(text) {
            LeafKind::Empty => Value::String(String::new()),
            LeafKind::Script(code) => {
                self.sandbox
                    .eval(code, ctx)
                    .map_err(|source| ResolveError::Script {
                        template: text.to_string(),
                        source,
                    })?
            }
            LeafKind::Path(path) => lookup(path, ctx, text)?,
            LeafKind::Interpolated(text) => Value::String(interpolate(text, ctx)?),
        };
        trace!(template = text, "resolved leaf");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptError;
    use serde_json::json;

    fn ctx() -> Map<String, Value> {
        let value = json!({
            "subject": {"name": "Bob"},
            "email": "bob@example.com",
            "reset": {"sent": false},
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn classify_prefixes() {
        assert_eq!(LeafKind::classify(""), LeafKind::Empty);
        assert_eq!(LeafKind::classify("!1+1"), LeafKind::Script("1+1"));
        assert_eq!(LeafKind::classify(":x"), LeafKind::Script("x"));
        assert_eq!(LeafKind::classify("{{ a }}"), LeafKind::Script(" a "));
        assert_eq!(LeafKind::classify("{{x"), LeafKind::Interpolated("{{x"));
        assert_eq!(LeafKind::classify("~a.b"), LeafKind::Path("a.b"));
        assert_eq!(LeafKind::classify("plain"), LeafKind::Interpolated("plain"));
    }

    #[test]
    fn script_yields_native_value() {
        let r = Resolver::default();
        assert_eq!(r.evaluate("!1+1", &ctx()).expect("resolve"), json!(2));
        assert_eq!(r.evaluate(":reset.sent", &ctx()).expect("resolve"), json!(false));
    }

    #[test]
    fn script_error_is_resolve_error() {
        let err = Resolver::default()
            .evaluate("!error('nope')", &ctx())
            .expect_err("should fail");
        match err {
            ResolveError::Script { template, source } => {
                assert_eq!(template, "!error('nope')");
                assert!(matches!(source, ScriptError::Runtime(_)));
            }
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[test]
    fn empty_text_is_empty_string() {
        assert_eq!(Resolver::default().evaluate("", &ctx()).expect("resolve"), json!(""));
    }

    #[test]
    fn composite_keeps_shape() {
        let tpl: Template = serde_json::from_value(json!({
            "to": "$email",
            "names": ["~.name", "$subject.name", 7],
            "nested": {"ok": "!reset.sent == false"},
            "flag": true,
        }))
        .expect("template");

        let value = Resolver::default().resolve(&tpl, &ctx()).expect("resolve");
        assert_eq!(
            value,
            json!({
                "to": "bob@example.com",
                "names": ["Bob", "Bob", 7],
                "nested": {"ok": true},
                "flag": true,
            })
        );
    }

    #[test]
    fn null_leaf_drops_map_key_but_not_list_slot() {
        let tpl: Template = serde_json::from_value(json!({
            "missing": "~subject.age",
            "list": ["~subject.age"],
            "literal": null,
        }))
        .expect("template");

        let value = Resolver::default().resolve(&tpl, &ctx()).expect("resolve");
        assert_eq!(value, json!({"list": [null], "literal": null}));
    }

    #[test]
    fn first_error_aborts() {
        let tpl: Template = serde_json::from_value(json!({"a": "$nope.x"})).expect("template");
        assert!(matches!(
            Resolver::default().resolve(&tpl, &ctx()),
            Err(ResolveError::MissingKey { .. })
        ));
    }
}
