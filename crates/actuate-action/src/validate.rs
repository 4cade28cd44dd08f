//! Input validation, conformation and in-field extraction.
//!
//! # Validation tags
//!
//! | Tag | Passes when |
//! |-----|-------------|
//! | `required` | present, not null, not an empty string |
//! | `email` | looks like `local@domain.tld` |
//! | `min=N` / `max=N` / `len=N` | string length in characters, list length, or numeric value |
//! | `eqfield=col` | equal to the `col` attribute |
//! | `oneof=a b c` | rendered value is one of the words |
//! | `numeric` | a number or a numeric string |
//! | `alpha` / `alphanum` | only letters / letters and digits |
//! | `uuid` | parses as a UUID |
//!
//! Absent or null values only fail `required`.
//!
//! # Conformation tags
//!
//! `trim`, `ltrim`, `rtrim`, `lower`, `upper`, `title`, `email`
//! (trim + lowercase), `name` (trim + title case), `num` (keep digits).
//! Applied in order, to string values only.

use crate::{Field, Rule, ValidationError};
use actuate_types::{render_text, Row};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

static EMAIL: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Checks every rule; the first failing tag aborts.
///
/// # Errors
///
/// Returns [`ValidationError::Invalid`] for the first failing tag and
/// [`ValidationError::UnknownTag`] for a tag this module does not know.
pub fn validate(rules: &[Rule], attributes: &Row) -> Result<(), ValidationError> {
    for rule in rules {
        let value = attributes.get(&rule.column_name);
        for tag in rule.tag_list() {
            check_tag(&rule.column_name, tag, value, attributes)?;
        }
    }
    Ok(())
}

fn check_tag(
    column: &str,
    tag: &str,
    value: Option<&Value>,
    attributes: &Row,
) -> Result<(), ValidationError> {
    let (name, param) = match tag.split_once('=') {
        Some((name, param)) => (name.trim(), Some(param.trim())),
        None => (tag, None),
    };

    let present = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    };

    if name == "required" {
        return match present {
            Some(_) => Ok(()),
            None => Err(ValidationError::invalid(column, "required")),
        };
    }

    let known = matches!(
        name,
        "email" | "min" | "max" | "len" | "eqfield" | "oneof" | "numeric" | "alpha" | "alphanum" | "uuid"
    );
    if !known {
        return Err(ValidationError::UnknownTag {
            column: column.to_string(),
            tag: tag.to_string(),
        });
    }

    let Some(value) = present else {
        return Ok(());
    };

    let ok = match (name, param) {
        ("email", _) => value.as_str().is_some_and(|s| email_pattern().is_match(s)),
        ("min", Some(n)) => measure(value).zip(n.parse::<f64>().ok()).is_some_and(|(m, n)| m >= n),
        ("max", Some(n)) => measure(value).zip(n.parse::<f64>().ok()).is_some_and(|(m, n)| m <= n),
        ("len", Some(n)) => measure(value)
            .zip(n.parse::<f64>().ok())
            .is_some_and(|(m, n)| (m - n).abs() < f64::EPSILON),
        ("eqfield", Some(other)) => attributes.get(other) == Some(value),
        ("oneof", Some(words)) => {
            let rendered = render_text(value);
            words.split_whitespace().any(|w| w == rendered)
        }
        ("numeric", _) => match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        },
        ("alpha", _) => value.as_str().is_some_and(|s| s.chars().all(char::is_alphabetic)),
        ("alphanum", _) => value.as_str().is_some_and(|s| s.chars().all(char::is_alphanumeric)),
        ("uuid", _) => value.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        _ => {
            return Err(ValidationError::invalid(
                column,
                format!("tag {name} needs a parameter"),
            ))
        }
    };

    if ok {
        Ok(())
    } else {
        debug!(column, tag, "validation failed");
        Err(ValidationError::invalid(column, tag))
    }
}

/// String length in characters, list length, or numeric value.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Applies conformation rules to string attributes in place.
pub fn conform(rules: &[Rule], attributes: &mut Row) {
    for rule in rules {
        let Some(Value::String(current)) = attributes.get(&rule.column_name) else {
            continue;
        };
        let mut text = current.clone();
        for tag in rule.tag_list() {
            text = match tag {
                "trim" => text.trim().to_string(),
                "ltrim" => text.trim_start().to_string(),
                "rtrim" => text.trim_end().to_string(),
                "lower" => text.to_lowercase(),
                "upper" => text.to_uppercase(),
                "title" => title_case(&text),
                "email" => text.trim().to_lowercase(),
                "name" => title_case(text.trim()),
                "num" => text.chars().filter(char::is_ascii_digit).collect(),
                unknown => {
                    warn!(column = %rule.column_name, tag = unknown, "unknown conformation tag");
                    text
                }
            };
        }
        attributes.insert(rule.column_name.clone(), Value::String(text));
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Extracts the declared in-fields from the request attributes.
///
/// A field that is absent or null takes its default when it has one.
/// Without a default, a required non-nullable field fails; any other field
/// is left out.
///
/// # Errors
///
/// Returns [`ValidationError::Blank`] for the first missing required field.
pub fn extract_in_fields(fields: &[Field], attributes: &Row) -> Result<Row, ValidationError> {
    let mut extracted = Row::new();
    for field in fields {
        match attributes.get(&field.column_name) {
            Some(value) if !value.is_null() || field.nullable => {
                extracted.insert(field.column_name.clone(), value.clone());
            }
            _ => {
                if let Some(default) = &field.default_value {
                    extracted.insert(field.column_name.clone(), default.clone());
                } else if field.required && !field.nullable {
                    return Err(ValidationError::Blank {
                        field: field.column_name.clone(),
                    });
                }
            }
        }
    }
    Ok(extracted)
}
