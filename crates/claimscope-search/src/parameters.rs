use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefixes for date search values
/// e.g., `ge2020-01-01`, `lt2020-02-15T00:00:00Z`
///
/// All FHIR prefixes are recognised so that the unsupported ones can be
/// rejected explicitly instead of being mistaken for part of the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa, // starts after
    Eb, // ends before
    Ap, // approximately
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchPrefix::Eq => "eq",
            SearchPrefix::Ne => "ne",
            SearchPrefix::Gt => "gt",
            SearchPrefix::Lt => "lt",
            SearchPrefix::Ge => "ge",
            SearchPrefix::Le => "le",
            SearchPrefix::Sa => "sa",
            SearchPrefix::Eb => "eb",
            SearchPrefix::Ap => "ap",
        };
        f.write_str(s)
    }
}

impl SearchPrefix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }

    /// Split a raw search value into its prefix and the remaining value.
    ///
    /// Values without a recognised two-letter prefix are returned whole.
    pub fn split(raw: &str) -> (Option<Self>, &str) {
        let trimmed = raw.trim();
        if trimmed.len() > 2 && trimmed.is_char_boundary(2) {
            let (head, rest) = trimmed.split_at(2);
            if let Some(prefix) = Self::parse(&head.to_ascii_lowercase()) {
                return (Some(prefix), rest);
            }
        }
        (None, trimmed)
    }

    /// Whether the prefix bounds a range from below.
    pub fn is_lower(self) -> bool {
        matches!(self, Self::Gt | Self::Ge | Self::Sa)
    }

    /// Whether the prefix bounds a range from above.
    pub fn is_upper(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Eb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_agree() {
        for s in ["eq", "ne", "gt", "lt", "ge", "le", "sa", "eb", "ap"] {
            let prefix = SearchPrefix::parse(s).unwrap();
            assert_eq!(prefix.to_string(), s);
        }
        assert!(SearchPrefix::parse("xx").is_none());
    }

    #[test]
    fn test_split_prefixed_value() {
        assert_eq!(
            SearchPrefix::split("ge2020-01-01"),
            (Some(SearchPrefix::Ge), "2020-01-01")
        );
        assert_eq!(
            SearchPrefix::split(" LT2020-02-15T00:00:00Z"),
            (Some(SearchPrefix::Lt), "2020-02-15T00:00:00Z")
        );
    }

    #[test]
    fn test_split_unprefixed_value() {
        assert_eq!(SearchPrefix::split("2020-01-01"), (None, "2020-01-01"));
        assert_eq!(SearchPrefix::split("ge"), (None, "ge"));
    }

    #[test]
    fn test_bound_sides() {
        assert!(SearchPrefix::Gt.is_lower());
        assert!(SearchPrefix::Le.is_upper());
        assert!(!SearchPrefix::Eq.is_lower());
        assert!(!SearchPrefix::Eq.is_upper());
        assert!(!SearchPrefix::Ne.is_lower() && !SearchPrefix::Ne.is_upper());
    }
}
