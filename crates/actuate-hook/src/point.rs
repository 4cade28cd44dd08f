//! Intercept points: a CRUD verb paired with a phase.

use crate::InterceptError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CRUD verb wrapped by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Insert one row.
    Create,
    /// List rows matching a query.
    ReadAll,
    /// Fetch one row by id.
    ReadOne,
    /// Modify rows.
    Update,
    /// Remove rows.
    Delete,
}

impl Verb {
    /// All verbs, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::ReadAll,
        Self::ReadOne,
        Self::Update,
        Self::Delete,
    ];

    /// HTTP method the verb corresponds to.
    #[must_use]
    pub const fn http_method(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::ReadAll | Self::ReadOne => "GET",
            Self::Update => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the verb only reads.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::ReadAll | Self::ReadOne)
    }

    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::ReadAll => "read_all",
            Self::ReadOne => "read_one",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an interceptor runs before or after the verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before the store is touched; may filter targets or abort.
    Before,
    /// After the store returned; sees result rows.
    After,
}

impl Phase {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// A point in the chain where interceptors fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterceptPoint {
    /// The wrapped verb.
    pub verb: Verb,
    /// Before or after.
    pub phase: Phase,
}

impl InterceptPoint {
    /// Creates a point.
    #[must_use]
    pub const fn new(verb: Verb, phase: Phase) -> Self {
        Self { verb, phase }
    }

    /// The before-point of a verb.
    #[must_use]
    pub const fn before(verb: Verb) -> Self {
        Self::new(verb, Phase::Before)
    }

    /// The after-point of a verb.
    #[must_use]
    pub const fn after(verb: Verb) -> Self {
        Self::new(verb, Phase::After)
    }

    /// Returns `true` for before-points.
    #[must_use]
    pub fn is_before(&self) -> bool {
        self.phase == Phase::Before
    }

    /// Returns `true` for after-points.
    #[must_use]
    pub fn is_after(&self) -> bool {
        self.phase == Phase::After
    }
}

impl fmt::Display for InterceptPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.verb.as_str(), self.phase.as_str())
    }
}

impl FromStr for InterceptPoint {
    type Err = InterceptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || InterceptError::UnknownPoint(s.to_string());
        let (verb, phase) = s.split_once('.').ok_or_else(unknown)?;
        let verb = Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == verb)
            .ok_or_else(unknown)?;
        let phase = match phase {
            "before" => Phase::Before,
            "after" => Phase::After,
            _ => return Err(unknown()),
        };
        Ok(Self::new(verb, phase))
    }
}
