//! Request path patterns.

use std::fmt;

/// An exact path or a `/**` prefix.
///
/// ```
/// use aegis_middleware::PathPattern;
///
/// let admin = PathPattern::new("/api/admin/**");
/// assert!(admin.matches("/api/admin"));
/// assert!(admin.matches("/api/admin/users/7"));
/// assert!(!admin.matches("/api/administrators"));
///
/// assert!(PathPattern::new("/api/auth/login").matches("/api/auth/login"));
/// assert!(PathPattern::new("/**").matches("/anything"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPattern {
    /// Matches one path.
    Exact(String),
    /// Matches a path and everything beneath it.
    Prefix(String),
}

impl PathPattern {
    /// Parses a pattern. A trailing `/**` makes it a prefix.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    /// Returns true if `path` matches.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => {
                prefix.is_empty()
                    || path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for PathPattern {
    fn from(pattern: String) -> Self {
        Self::new(&pattern)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{prefix}/**"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_source() {
        for source in ["/api/auth/login", "/api/**", "/**"] {
            assert_eq!(PathPattern::new(source).to_string(), source);
        }
    }

    #[test]
    fn test_exact_does_not_match_children() {
        let pattern = PathPattern::new("/api/auth/login");
        assert!(!pattern.matches("/api/auth/login/extra"));
        assert!(!pattern.matches("/api/auth"));
    }
}
