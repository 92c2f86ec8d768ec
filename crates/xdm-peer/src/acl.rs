//! Access control for the guest side.
//!
//! Each pattern is either an anchored regular expression (it starts with `^`
//! and is used as-is) or a wildcard string where `*` matches any run of
//! characters and `?` matches one character. Wildcard patterns match the whole
//! origin.

use regex::Regex;

use crate::error::{PeerError, Result};

/// A compiled list of permitted remote origins.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    patterns: Vec<Regex>,
}

impl Acl {
    /// Compile `patterns`. Fails on the first pattern that is not a valid
    /// regular expression.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&to_regex(pattern)).map_err(|source| PeerError::InvalidAcl {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern accepts `origin`.
    pub fn matches(&self, origin: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(origin))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Regular expression source for one ACL pattern.
pub fn to_regex(pattern: &str) -> String {
    if pattern.starts_with('^') {
        return pattern.to_string();
    }
    format!("^{}$", pattern.replace('*', ".*").replace('?', "."))
}

/// Check `origin` against `patterns` without keeping the compiled list.
pub fn check_acl<S: AsRef<str>>(patterns: &[S], origin: &str) -> Result<bool> {
    Ok(Acl::new(patterns)?.matches(origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acl() -> Acl {
        Acl::new([
            "http://www.domain.invalid",
            "*.domaina.com",
            "http://dom?inb.com",
            r"^http://domc{3}ain\.com$",
        ])
        .unwrap()
    }

    #[test]
    fn matches_complete_string() {
        assert!(acl().matches("http://www.domain.invalid"));
    }

    #[test]
    fn matches_star_wildcard() {
        assert!(acl().matches("http://www.domaina.com"));
    }

    #[test]
    fn matches_question_mark_wildcard() {
        assert!(acl().matches("http://domainb.com"));
    }

    #[test]
    fn matches_regex_pattern() {
        assert!(acl().matches("http://domcccain.com"));
    }

    #[test]
    fn rejects_unlisted_origin() {
        assert!(!acl().matches("http://foo.com"));
        assert!(!acl().matches("http://www.domain.invalid.evil.com"));
    }

    #[test]
    fn subdomain_wildcard() {
        let acl = Acl::new(["*.example.com"]).unwrap();
        assert!(acl.matches("http://sub.example.com"));
        assert!(!acl.matches("http://evil.com"));
    }

    #[test]
    fn wildcard_translation() {
        assert_eq!(to_regex("*.a?.com"), "^.*.a..com$");
        assert_eq!(to_regex("^raw$"), "^raw$");
    }

    #[test]
    fn empty_acl_matches_nothing() {
        let acl = Acl::default();
        assert!(acl.is_empty());
        assert!(!acl.matches("http://any.test"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Acl::new(["^(unclosed"]).unwrap_err();
        assert!(matches!(err, PeerError::InvalidAcl { ref pattern, .. } if pattern == "^(unclosed"));
        assert!(check_acl(&["^(unclosed"], "x").is_err());
        assert!(check_acl(&["http://a.test"], "http://a.test").unwrap());
    }
}
