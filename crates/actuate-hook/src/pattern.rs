//! Table patterns selecting which tables an interceptor applies to.
//!
//! ```text
//! "*"        every table
//! "user_*"   tables whose name starts with "user_"
//! "invoice"  exactly "invoice"
//! ```

use crate::InterceptError;
use std::fmt;

/// Parsed table pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePattern {
    /// Matches every table.
    Any,
    /// Matches tables starting with the prefix.
    Prefix(String),
    /// Matches one table.
    Exact(String),
}

impl TablePattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptError::InvalidPattern`] for empty patterns or a
    /// `*` anywhere but the end.
    pub fn parse(pattern: &str) -> Result<Self, InterceptError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(InterceptError::InvalidPattern("empty pattern".into()));
        }
        if pattern == "*" {
            return Ok(Self::Any);
        }
        match pattern.strip_suffix('*') {
            Some(prefix) if !prefix.contains('*') => Ok(Self::Prefix(prefix.to_string())),
            Some(_) => Err(InterceptError::InvalidPattern(pattern.to_string())),
            None if pattern.contains('*') => {
                Err(InterceptError::InvalidPattern(pattern.to_string()))
            }
            None => Ok(Self::Exact(pattern.to_string())),
        }
    }

    /// Returns `true` if the pattern selects the table.
    #[must_use]
    pub fn matches(&self, table: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => table.starts_with(prefix.as_str()),
            Self::Exact(name) => name == table,
        }
    }
}

impl fmt::Display for TablePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Exact(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variants() {
        assert_eq!(TablePattern::parse("*"), Ok(TablePattern::Any));
        assert_eq!(
            TablePattern::parse("user_*"),
            Ok(TablePattern::Prefix("user_".into()))
        );
        assert_eq!(
            TablePattern::parse(" invoice "),
            Ok(TablePattern::Exact("invoice".into()))
        );
    }

    #[test]
    fn parse_rejects_bad_wildcards() {
        assert!(TablePattern::parse("").is_err());
        assert!(TablePattern::parse("*_account").is_err());
        assert!(TablePattern::parse("u*s*").is_err());
    }

    #[test]
    fn matching() {
        let prefix = TablePattern::parse("user_*").expect("valid");
        assert!(prefix.matches("user_account"));
        assert!(!prefix.matches("usergroup"));
        assert!(TablePattern::Any.matches("anything"));
        assert!(!TablePattern::Exact("a".into()).matches("ab"));
    }

    #[test]
    fn display_round_trips() {
        for raw in ["*", "user_*", "invoice"] {
            assert_eq!(TablePattern::parse(raw).expect("valid").to_string(), raw);
        }
    }
}
