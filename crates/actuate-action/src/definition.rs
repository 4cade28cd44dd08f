//! Declarative action definitions.
//!
//! An [`ActionDefinition`] is loaded once from the catalog and only read
//! while an invocation runs.
//!
//! ```
//! use actuate_action::{ActionDefinition, Method};
//! use serde_json::json;
//!
//! let action: ActionDefinition = serde_json::from_value(json!({
//!     "type": "user_account",
//!     "name": "password.reset.begin",
//!     "instance_optional": true,
//!     "in_fields": [{"column_name": "email"}],
//!     "out_fields": [
//!         {"type": "password.reset.begin", "method": "EXECUTE", "reference": "reset",
//!          "attributes": {"email": "~email"}},
//!         {"type": "client.notify", "method": "ACTIONRESPONSE",
//!          "attributes": {"type": "!reset.sent and 'success' or 'error'"}}
//!     ]
//! }))
//! .expect("definition");
//!
//! assert_eq!(action.out_fields[0].method, Method::Execute);
//! assert!(action.in_fields[0].required);
//! ```

use actuate_script::Template;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One named, multi-step action on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Table the action is declared on.
    #[serde(rename = "type", alias = "on_type", alias = "OnType")]
    pub on_type: String,

    /// Action name, unique per table.
    #[serde(alias = "Name")]
    pub name: String,

    /// Human readable label.
    #[serde(default, alias = "Label")]
    pub label: String,

    /// Accepted input fields.
    #[serde(default, alias = "inFields", alias = "InFields")]
    pub in_fields: Vec<Field>,

    /// Ordered steps.
    #[serde(default, alias = "outFields", alias = "OutFields")]
    pub out_fields: Vec<Outcome>,

    /// Validation rules checked before the first step.
    #[serde(default, alias = "Validations")]
    pub validations: Vec<Rule>,

    /// String normalisations applied before extraction.
    #[serde(default, alias = "Conformations")]
    pub conformations: Vec<Rule>,

    /// Whether the action may run without a subject row.
    #[serde(default, alias = "instanceOptional", alias = "InstanceOptional")]
    pub instance_optional: bool,
}

impl ActionDefinition {
    /// Attribute naming the subject row: `<type>_id`.
    #[must_use]
    pub fn subject_key(&self) -> String {
        format!("{}_id", self.on_type)
    }
}

fn default_true() -> bool {
    true
}

/// An accepted input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Attribute name.
    #[serde(alias = "columnName", alias = "ColumnName", alias = "name")]
    pub column_name: String,

    /// Whether the attribute must be supplied.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Value used when the attribute is absent.
    #[serde(default, alias = "defaultValue", alias = "DefaultValue")]
    pub default_value: Option<Value>,

    /// Whether an absent or null value is acceptable.
    #[serde(default, alias = "isNullable", alias = "IsNullable")]
    pub nullable: bool,
}

impl Field {
    /// A required field without a default.
    #[must_use]
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            required: true,
            default_value: None,
            nullable: false,
        }
    }
}

/// A validation or conformation rule: comma-separated tags on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Attribute the rule applies to.
    #[serde(alias = "columnName", alias = "ColumnName")]
    pub column_name: String,

    /// Comma-separated tags, e.g. `required,email`.
    #[serde(alias = "Tags")]
    pub tags: String,
}

impl Rule {
    /// Creates a rule.
    #[must_use]
    pub fn new(column_name: impl Into<String>, tags: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            tags: tags.into(),
        }
    }

    /// The individual tags, trimmed, without empty entries.
    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.tags.split(',').map(str::trim).filter(|t| !t.is_empty())
    }
}

/// One declarative step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Target table, performer name or system type.
    #[serde(rename = "type", alias = "Type")]
    pub outcome_type: String,

    /// How the step is executed.
    #[serde(default, alias = "Method")]
    pub method: Method,

    /// Attribute templates resolved against the request context.
    #[serde(default, alias = "Attributes")]
    pub attributes: BTreeMap<String, Template>,

    /// Skip the step unless this resolves to a truthy value.
    #[serde(default, alias = "Condition")]
    pub condition: String,

    /// Context key the step's result is stored under.
    #[serde(default, alias = "Reference")]
    pub reference: String,

    /// Keep the step's responses out of the final list.
    #[serde(default, alias = "skipInResponse", alias = "SkipInResponse")]
    pub skip_in_response: bool,

    /// A resolution failure emits its error response and the loop goes on.
    #[serde(default, alias = "continueOnError", alias = "ContinueOnError")]
    pub continue_on_error: bool,

    /// Log the step's responses at `info`.
    #[serde(default, alias = "logToConsole", alias = "LogToConsole")]
    pub log_to_console: bool,
}

impl Outcome {
    /// A step with no attributes.
    #[must_use]
    pub fn new(outcome_type: impl Into<String>, method: Method) -> Self {
        Self {
            outcome_type: outcome_type.into(),
            method,
            attributes: BTreeMap::new(),
            condition: String::new(),
            reference: String::new(),
            skip_in_response: false,
            continue_on_error: false,
            log_to_console: false,
        }
    }

    /// Adds an attribute template.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, template: impl Into<Template>) -> Self {
        self.attributes.insert(key.into(), template.into());
        self
    }

    /// Sets the reference.
    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Sets the condition.
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }
}

/// Execution method of an outcome.
///
/// | Name | Variant |
/// |------|---------|
/// | `POST` | [`Create`](Self::Create) |
/// | `GET` | [`ReadList`](Self::ReadList) |
/// | `GET_BY_ID` | [`ReadById`](Self::ReadById) |
/// | `PATCH`, `PUT` | [`Update`](Self::Update) |
/// | `DELETE` | [`Delete`](Self::Delete) |
/// | `EXECUTE` | [`Execute`](Self::Execute) |
/// | `ACTIONRESPONSE` | [`ActionResponse`](Self::ActionResponse) |
/// | anything else | [`Other`](Self::Other), executed by outcome type |
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Method {
    /// Insert a row.
    Create,
    /// List rows; attributes become query parameters.
    ReadList,
    /// Fetch one row by `reference_id`.
    ReadById,
    /// Modify the row named by `reference_id`.
    Update,
    /// Remove the row named by `reference_id`.
    Delete,
    /// Run the performer named by the outcome type.
    Execute,
    /// Package the attributes as a response.
    ActionResponse,
    /// Unrecognised name.
    Other(String),
}

impl Method {
    /// Canonical name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "POST",
            Self::ReadList => "GET",
            Self::ReadById => "GET_BY_ID",
            Self::Update => "PATCH",
            Self::Delete => "DELETE",
            Self::Execute => "EXECUTE",
            Self::ActionResponse => "ACTIONRESPONSE",
            Self::Other(name) => name,
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for Method {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "POST" => Self::Create,
            "GET" => Self::ReadList,
            "GET_BY_ID" => Self::ReadById,
            "PATCH" | "PUT" => Self::Update,
            "DELETE" => Self::Delete,
            "EXECUTE" => Self::Execute,
            "ACTIONRESPONSE" => Self::ActionResponse,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_names() {
        assert_eq!(Method::from("post"), Method::Create);
        assert_eq!(Method::from("PUT"), Method::Update);
        assert_eq!(Method::from("GET_BY_ID"), Method::ReadById);
        assert_eq!(Method::from("SWITCH_USER"), Method::Other("SWITCH_USER".into()));
        assert_eq!(Method::Update.to_string(), "PATCH");
    }

    #[test]
    fn outcome_defaults() {
        let outcome: Outcome = serde_json::from_value(json!({"type": "note"})).expect("outcome");
        assert_eq!(outcome.method, Method::Other(String::new()));
        assert!(outcome.attributes.is_empty());
        assert!(outcome.reference.is_empty());
        assert!(!outcome.skip_in_response);
    }

    #[test]
    fn camel_case_aliases() {
        let outcome: Outcome = serde_json::from_value(json!({
            "Type": "note",
            "Method": "POST",
            "SkipInResponse": true,
            "continueOnError": true,
        }))
        .expect("outcome");
        assert_eq!(outcome.method, Method::Create);
        assert!(outcome.skip_in_response);
        assert!(outcome.continue_on_error);
    }

    #[test]
    fn field_defaults() {
        let field: Field = serde_json::from_value(json!({"name": "email"})).expect("field");
        assert_eq!(field, Field::new("email"));
    }

    #[test]
    fn rule_tags_are_trimmed() {
        let rule = Rule::new("email", " required, email ,,");
        assert_eq!(rule.tag_list().collect::<Vec<_>>(), vec!["required", "email"]);
    }

    #[test]
    fn method_serializes_as_name() {
        let outcome = Outcome::new("note", Method::ReadList);
        let value = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(value["method"], json!("GET"));
        assert_eq!(value["type"], json!("note"));
    }

    #[test]
    fn subject_key() {
        let action: ActionDefinition =
            serde_json::from_value(json!({"type": "invoice", "name": "send"})).expect("action");
        assert_eq!(action.subject_key(), "invoice_id");
        assert!(!action.instance_optional);
    }
}
