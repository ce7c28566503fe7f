use std::cmp::Ordering;
use std::fmt;

/// Semantic version of a backend build.
///
/// Build metadata (`+...`) is ignored. A pre-release (`-...`) sorts below the
/// release it precedes; pre-release tags are compared as plain strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl BackendVersion {
    /// Parses `1.2.3`, `v1.2`, `1.2.3-beta.1+build`. Missing components are zero.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core_and_pre = trimmed.split('+').next()?;
        let (core, pre) = match core_and_pre.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return None,
            None => (core_and_pre, None),
        };

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl Ord for BackendVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for BackendVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BackendVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// True when `current` is at least `min_version`.
///
/// An unknown or unparsable version is never compatible.
pub fn is_compatible(current: Option<&str>, min_version: &str) -> bool {
    let Some(current) = current.and_then(BackendVersion::parse) else {
        return false;
    };
    let Some(min) = BackendVersion::parse(min_version) else {
        return false;
    };
    current >= min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_and_prefixed_versions() {
        let v = BackendVersion::parse("v1.2").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 0));
        assert_eq!(BackendVersion::parse("1.1.1+abc").unwrap().to_string(), "1.1.1");
        assert!(BackendVersion::parse("one.two").is_none());
        assert!(BackendVersion::parse("1.2.3.4").is_none());
        assert!(BackendVersion::parse("").is_none());
    }

    #[test]
    fn compatibility_boundary() {
        assert!(is_compatible(Some("1.1.1"), "1.1.1"));
        assert!(is_compatible(Some("1.2.0"), "1.1.1"));
        assert!(is_compatible(Some("2.0.0"), "1.1.1"));
        assert!(!is_compatible(Some("1.1.0"), "1.1.1"));
        assert!(!is_compatible(Some("1.0.9"), "1.1.1"));
    }

    #[test]
    fn prerelease_is_below_release() {
        assert!(!is_compatible(Some("1.1.1-beta.2"), "1.1.1"));
        assert!(is_compatible(Some("1.1.2-beta.1"), "1.1.1"));
    }

    #[test]
    fn unknown_version_is_incompatible() {
        assert!(!is_compatible(None, "1.1.1"));
        assert!(!is_compatible(Some("nightly"), "1.1.1"));
    }
}
