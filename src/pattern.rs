//! Override and critical-mapping patterns.
//!
//! A pattern is either an exact key or a literal prefix followed by `*`
//! (`home.header.*`). Keys are an element's identifier or its
//! `elementType_label` composite.
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
}

/// How a pattern matched a key. Orders from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMatch {
    /// Carries the literal prefix length.
    Prefix(usize),
    Exact,
}

impl Ord for PatternMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Exact, Self::Exact) => Ordering::Equal,
            (Self::Exact, Self::Prefix(_)) => Ordering::Greater,
            (Self::Prefix(_), Self::Exact) => Ordering::Less,
            (Self::Prefix(a), Self::Prefix(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PatternMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(raw.to_string()),
        }
    }

    pub fn matches(&self, key: &str) -> Option<PatternMatch> {
        match self {
            Self::Exact(exact) => (exact == key).then_some(PatternMatch::Exact),
            Self::Prefix(prefix) => key
                .starts_with(prefix.as_str())
                .then_some(PatternMatch::Prefix(prefix.len())),
        }
    }

    /// Best match of this pattern against any of `keys`.
    pub fn best_match<'k, I>(&self, keys: I) -> Option<PatternMatch>
    where
        I: IntoIterator<Item = &'k str>,
    {
        keys.into_iter().filter_map(|k| self.matches(k)).max()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => write!(f, "{exact}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Pattern::parse("home.header.*"), Pattern::Prefix("home.header.".into()));
        assert_eq!(Pattern::parse("submitButton"), Pattern::Exact("submitButton".into()));
        assert_eq!(Pattern::parse("home.header.*").to_string(), "home.header.*");
    }

    #[test]
    fn test_matches() {
        let prefix = Pattern::parse("home.header.*");
        assert_eq!(prefix.matches("home.header.title"), Some(PatternMatch::Prefix(12)));
        assert_eq!(prefix.matches("home.footer"), None);

        let exact = Pattern::parse("UIButton_Generate Music");
        assert_eq!(exact.matches("UIButton_Generate Music"), Some(PatternMatch::Exact));
        assert_eq!(exact.matches("UIButton_Generate"), None);
    }

    #[test]
    fn test_match_ordering() {
        assert!(PatternMatch::Exact > PatternMatch::Prefix(100));
        assert!(PatternMatch::Prefix(12) > PatternMatch::Prefix(5));
        let p = Pattern::parse("a*");
        assert_eq!(p.best_match(["b", "abc"]), Some(PatternMatch::Prefix(1)));
    }
}
