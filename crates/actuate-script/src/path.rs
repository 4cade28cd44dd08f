//! Path lookup (`~a.b`) and `$` interpolation over the request context.

use crate::ResolveError;
use actuate_types::render_text;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Alias used when a path starts with an empty segment (`~.name`, `$.name`).
pub const SUBJECT: &str = "subject";

static REFERENCE: OnceLock<Regex> = OnceLock::new();

fn reference_pattern() -> &'static Regex {
    REFERENCE.get_or_init(|| {
        Regex::new(r"\$([a-zA-Z0-9_\[\]]+)?(\.[a-zA-Z0-9_\[\]]+)*")
            .expect("reference pattern is valid")
    })
}

fn segments(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split('.').collect();
    if parts.first().is_some_and(|first| first.is_empty()) {
        parts[0] = SUBJECT;
    }
    parts
}

/// Resolves a `~` path.
///
/// An empty first segment, or a first segment that is not a top-level
/// context key, reads from `subject`. A missing or null intermediate
/// yields `null`; an intermediate that is present but not a map is an
/// error. A missing final key yields `null`.
pub fn lookup(
    path: &str,
    ctx: &Map<String, Value>,
    template: &str,
) -> Result<Value, ResolveError> {
    let mut parts = segments(path);
    if parts.first().is_some_and(|first| !ctx.contains_key(*first)) {
        parts.insert(0, SUBJECT);
    }
    let Some((last, intermediates)) = parts.split_last() else {
        return Ok(Value::Null);
    };

    let mut current = ctx;
    for part in intermediates {
        match current.get(*part) {
            None | Some(Value::Null) => return Ok(Value::Null),
            Some(Value::Object(map)) => current = map,
            Some(_) => {
                return Err(ResolveError::NotAMap {
                    template: template.to_string(),
                    segment: (*part).to_string(),
                })
            }
        }
    }

    Ok(current.get(*last).cloned().unwrap_or(Value::Null))
}

/// Substitutes every `$path` reference in `text` with its rendered value.
///
/// The result is always a string. A lone `$` is left untouched.
///
/// ```
/// use actuate_script::path::interpolate;
/// use serde_json::json;
///
/// let ctx = json!({"subject": {"name": "Bob"}, "r": [{"id": 7}]});
/// let ctx = ctx.as_object().expect("object");
///
/// assert_eq!(interpolate("hi $subject.name", ctx).expect("resolve"), "hi Bob");
/// assert_eq!(interpolate("$.name, $", ctx).expect("resolve"), "Bob, $");
/// assert_eq!(interpolate("#$r[0].id", ctx).expect("resolve"), "#7");
/// ```
///
/// # Errors
///
/// - [`ResolveError::MissingKey`] when a key before the last segment is absent
/// - [`ResolveError::IndexOutOfRange`] for a bracketed index past the end
/// - [`ResolveError::NotAMap`] when a segment walks into a scalar
pub fn interpolate(text: &str, ctx: &Map<String, Value>) -> Result<String, ResolveError> {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;

    for m in reference_pattern().find_iter(text) {
        out.push_str(&text[last_end..m.start()]);
        last_end = m.end();

        let path = &m.as_str()[1..];
        if path.is_empty() {
            out.push('$');
            continue;
        }
        let value = resolve_reference(path, ctx, text)?;
        out.push_str(&render_text(&value));
    }

    out.push_str(&text[last_end..]);
    Ok(out)
}

fn resolve_reference(
    path: &str,
    ctx: &Map<String, Value>,
    template: &str,
) -> Result<Value, ResolveError> {
    let parts = segments(path);
    let Some((last, intermediates)) = parts.split_last() else {
        return Ok(Value::Null);
    };

    let mut current = ctx;
    for part in intermediates {
        let next = step(current, part, template)?.ok_or_else(|| ResolveError::MissingKey {
            template: template.to_string(),
            key: (*part).to_string(),
        })?;
        match next {
            Value::Object(map) => current = map,
            Value::Null => return Ok(Value::Null),
            _ => {
                return Err(ResolveError::NotAMap {
                    template: template.to_string(),
                    segment: (*part).to_string(),
                })
            }
        }
    }

    Ok(step(current, last, template)?.cloned().unwrap_or(Value::Null))
}

/// Looks up one segment: the literal key first, then `name[index]`.
fn step<'a>(
    map: &'a Map<String, Value>,
    part: &str,
    template: &str,
) -> Result<Option<&'a Value>, ResolveError> {
    if let Some(value) = map.get(part) {
        return Ok(Some(value));
    }

    let Some((name, index)) = split_index(part) else {
        return Ok(None);
    };
    match map.get(name) {
        None => Ok(None),
        Some(Value::Array(items)) => items.get(index).map(Some).ok_or_else(|| {
            ResolveError::IndexOutOfRange {
                template: template.to_string(),
                index,
                len: items.len(),
            }
        }),
        Some(_) => Err(ResolveError::NotAMap {
            template: template.to_string(),
            segment: name.to_string(),
        }),
    }
}

fn split_index(part: &str) -> Option<(&str, usize)> {
    let (name, rest) = part.split_once('[')?;
    let index = rest.strip_suffix(']')?.parse().ok()?;
    Some((name, index))
}
