//! Service name filtering shared by all backends.

use crate::Result;

/// A listing filter. Empty and `*` match everything.
#[derive(Debug, Clone)]
pub enum ServicePattern {
    All,
    Glob(glob::Pattern),
}

impl ServicePattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if is_match_all(pattern) {
            return Ok(Self::All);
        }
        Ok(Self::Glob(glob::Pattern::new(pattern)?))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Glob(pattern) => pattern.matches(name),
        }
    }
}

/// Whether `pattern` means "no filtering".
pub fn is_match_all(pattern: &str) -> bool {
    pattern.is_empty() || pattern == "*"
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &["sshd", "cronie", "crond", "nginx", "net.eth0"];

    fn filter(pattern: &str) -> Vec<&'static str> {
        let pattern = ServicePattern::parse(pattern).unwrap();
        NAMES.iter().copied().filter(|n| pattern.matches(n)).collect()
    }

    #[test]
    fn empty_and_star_match_everything() {
        assert_eq!(filter(""), NAMES);
        assert_eq!(filter("*"), NAMES);
        assert!(matches!(ServicePattern::parse("*").unwrap(), ServicePattern::All));
    }

    #[test]
    fn glob_selects_subset() {
        assert_eq!(filter("cron*"), vec!["cronie", "crond"]);
        assert_eq!(filter("net.*"), vec!["net.eth0"]);
        assert_eq!(filter("ssh?"), vec!["sshd"]);
        assert!(filter("apache*").is_empty());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = ServicePattern::parse("[abc").unwrap_err();
        assert!(matches!(err, crate::Error::Pattern(_)));
    }
}
