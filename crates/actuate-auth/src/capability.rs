//! Capabilities that a permission tier can grant.
//!
//! # Example
//!
//! ```
//! use actuate_auth::Capability;
//!
//! let crud = Capability::CRUD;
//! assert!(crud.contains(Capability::UPDATE));
//! assert!(!crud.contains(Capability::EXECUTE));
//!
//! let parsed = Capability::parse_expr("peek|read").expect("valid expression");
//! assert_eq!(parsed, Capability::PEEK | Capability::READ);
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Capability bits evaluated within a single permission tier.
    ///
    /// | Capability | Gates |
    /// |------------|-------|
    /// | [`PEEK`](Self::PEEK) | seeing that a row exists, reading relationship edges |
    /// | [`READ`](Self::READ) | reading rows and columns |
    /// | [`CREATE`](Self::CREATE) | inserting rows |
    /// | [`UPDATE`](Self::UPDATE) | modifying rows (the "write" check) |
    /// | [`DELETE`](Self::DELETE) | removing rows |
    /// | [`EXECUTE`](Self::EXECUTE) | invoking actions |
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capability: u8 {
        /// Existence and relationship visibility.
        const PEEK    = 0b0000_0001;
        /// Read access.
        const READ    = 0b0000_0010;
        /// Insert access.
        const CREATE  = 0b0000_0100;
        /// Modify access.
        const UPDATE  = 0b0000_1000;
        /// Remove access.
        const DELETE  = 0b0001_0000;
        /// Action invocation.
        const EXECUTE = 0b0010_0000;
    }
}

impl Capability {
    /// Write access is checked as UPDATE.
    pub const WRITE: Self = Self::UPDATE;

    /// READ | CREATE | UPDATE | DELETE.
    pub const CRUD: Self = Self::READ
        .union(Self::CREATE)
        .union(Self::UPDATE)
        .union(Self::DELETE);

    /// Every capability.
    pub const ALL: Self = Self::CRUD.union(Self::PEEK).union(Self::EXECUTE);

    /// Returns the names of the set bits, in declaration order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::PEEK) {
            names.push("PEEK");
        }
        if self.contains(Self::READ) {
            names.push("READ");
        }
        if self.contains(Self::CREATE) {
            names.push("CREATE");
        }
        if self.contains(Self::UPDATE) {
            names.push("UPDATE");
        }
        if self.contains(Self::DELETE) {
            names.push("DELETE");
        }
        if self.contains(Self::EXECUTE) {
            names.push("EXECUTE");
        }
        names
    }

    /// Parses a single capability name (case-insensitive).
    ///
    /// Accepts the six bit names plus `WRITE` (alias for UPDATE), `EXEC`,
    /// `CRUD`, `ALL` and `NONE`.
    ///
    /// ```
    /// use actuate_auth::Capability;
    ///
    /// assert_eq!(Capability::parse("write"), Some(Capability::UPDATE));
    /// assert_eq!(Capability::parse("none"), Some(Capability::empty()));
    /// assert_eq!(Capability::parse("fly"), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "PEEK" => Some(Self::PEEK),
            "READ" => Some(Self::READ),
            "CREATE" => Some(Self::CREATE),
            "UPDATE" | "WRITE" => Some(Self::UPDATE),
            "DELETE" => Some(Self::DELETE),
            "EXECUTE" | "EXEC" => Some(Self::EXECUTE),
            "CRUD" => Some(Self::CRUD),
            "ALL" => Some(Self::ALL),
            "NONE" | "" => Some(Self::empty()),
            _ => None,
        }
    }

    /// Parses a `|`-separated capability expression such as `"PEEK|READ"`.
    ///
    /// Returns the first unknown name on failure.
    pub fn parse_expr(expr: &str) -> Result<Self, String> {
        expr.split('|').try_fold(Self::empty(), |acc, part| {
            Self::parse(part)
                .map(|c| acc | c)
                .ok_or_else(|| part.trim().to_string())
        })
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_capability() {
        for cap in [
            Capability::PEEK,
            Capability::READ,
            Capability::CREATE,
            Capability::UPDATE,
            Capability::DELETE,
            Capability::EXECUTE,
        ] {
            assert!(Capability::ALL.contains(cap), "missing {cap}");
        }
    }

    #[test]
    fn crud_excludes_peek_and_execute() {
        assert!(!Capability::CRUD.contains(Capability::PEEK));
        assert!(!Capability::CRUD.contains(Capability::EXECUTE));
    }

    #[test]
    fn write_is_update() {
        assert_eq!(Capability::WRITE, Capability::UPDATE);
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(Capability::parse("read"), Some(Capability::READ));
        assert_eq!(Capability::parse(" Delete "), Some(Capability::DELETE));
        assert_eq!(Capability::parse("exec"), Some(Capability::EXECUTE));
    }

    #[test]
    fn parse_expr_combines() {
        assert_eq!(
            Capability::parse_expr("peek | read|EXECUTE"),
            Ok(Capability::PEEK | Capability::READ | Capability::EXECUTE)
        );
    }

    #[test]
    fn parse_expr_reports_unknown() {
        assert_eq!(Capability::parse_expr("read|fly"), Err("fly".to_string()));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(Capability::READ.to_string(), "READ");
        assert_eq!(
            (Capability::PEEK | Capability::DELETE).to_string(),
            "PEEK | DELETE"
        );
        assert_eq!(Capability::empty().to_string(), "(none)");
    }
}
