use crate::resolver::ResolveError;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const VERSION_PATTERN: &str = r"^v?([0-9]+)\.([0-9]+)\.([0-9]+)(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+[0-9A-Za-z-]+)?$";

fn version_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_PATTERN).ok()).as_ref()
}

/// Semantic version with an optional free-form suffix (e.g. `1.2.0-dev.feature-x`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: String,
}

impl Version {
    /// Create a new release version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
            suffix: String::new(),
        }
    }

    /// Return a copy of this version carrying `suffix`
    pub fn with_suffix(&self, suffix: impl Into<String>) -> Self {
        Version {
            suffix: suffix.into(),
            ..self.clone()
        }
    }

    /// Parse a version string.
    ///
    /// Accepts an optional leading `v` and an optional `+BUILD` segment; neither is kept.
    /// Returns `None` when the text does not follow the version grammar.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = version_regex()?.captures(text)?;
        // Components too large for u32 are treated as malformed
        let major = caps[1].parse::<u32>().ok()?;
        let minor = caps[2].parse::<u32>().ok()?;
        let patch = caps[3].parse::<u32>().ok()?;
        let suffix = caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default();

        Some(Version {
            major,
            minor,
            patch,
            suffix,
        })
    }

    /// A release version has no suffix
    pub fn is_release(&self) -> bool {
        self.suffix.is_empty()
    }

    /// Compare on `(major, minor, patch)` only; the suffix never affects ordering
    pub fn cmp_core(&self, other: &Version) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }

    /// Start the next minor line: `minor + 1`, patch reset to 0, suffix kept.
    ///
    /// `None` when the minor component is already `u32::MAX`.
    pub fn next_minor(&self) -> Option<Self> {
        Some(Version {
            major: self.major,
            minor: self.minor.checked_add(1)?,
            patch: 0,
            suffix: self.suffix.clone(),
        })
    }

    /// Render in the form pip accepts (PEP 440).
    ///
    /// `1.2.0-dev.foo` -> `1.2.0.dev1+foo`, `1.2.0-dev` -> `1.2.0.dev1`
    pub fn to_pip_compatible_string(&self) -> String {
        pip_compatible(&self.to_string())
    }
}

/// Convert an already rendered version string to its pip-compatible form
pub fn pip_compatible(version: &str) -> String {
    if version.contains("-dev.") {
        version.replacen("-dev.", ".dev1+", 1)
    } else {
        version.replacen("-dev", ".dev1", 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.suffix.is_empty() {
            write!(f, "-{}", self.suffix)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s).ok_or_else(|| ResolveError::InvalidFormat {
            version: s.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert!(v.is_release());
    }

    #[test]
    fn test_version_parse_with_suffix() {
        let v = Version::parse("1.2.0-dev.feature-x").unwrap();
        assert_eq!(v, Version::new(1, 2, 0).with_suffix("dev.feature-x"));
        assert!(!v.is_release());
    }

    #[test]
    fn test_build_metadata_is_discarded() {
        let v = Version::parse("v1.0.0-dev+abc-123").unwrap();
        assert_eq!(v.to_string(), "1.0.0-dev");
        assert_eq!(Version::parse("1.0.0+build").unwrap().to_string(), "1.0.0");
    }

    #[test]
    fn test_tag_formats() {
        for tag in ["1.0.0", "1.0.0-dev", "1.0.0-dev.foo", "v1.0.0", "v1.0.0-dev"] {
            assert!(Version::parse(tag).is_some(), "{} should parse", tag);
        }
    }

    #[test]
    fn test_version_parse_invalid() {
        for text in [
            "",
            "foobar",
            "1.2",
            "v1.2.3.4",
            "f1.0.0",
            "V1.2.3",
            "1.0.0-",
            "1.0.0-dev..foo",
            "1.0.0-dev_foo",
            "1.0.0+",
            " 1.0.0",
            "99999999999.0.0",
        ] {
            assert!(Version::parse(text).is_none(), "{:?} should not parse", text);
        }
    }

    #[test]
    fn test_from_str_reports_input() {
        let err = "foo".parse::<Version>().unwrap_err();
        assert_eq!(
            err,
            ResolveError::InvalidFormat {
                version: "foo".to_string()
            }
        );
    }

    #[test]
    fn test_cmp_core_ignores_suffix() {
        let release = Version::new(1, 2, 0);
        let dev = release.with_suffix("dev.x");
        assert_eq!(release.cmp_core(&dev), Ordering::Equal);
        assert_ne!(release, dev);
        assert_eq!(
            Version::new(1, 10, 0).cmp_core(&Version::new(1, 9, 9)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_next_minor() {
        let v = Version::new(2, 1, 7);
        assert_eq!(v.next_minor(), Some(Version::new(2, 2, 0)));
        assert_eq!(Version::new(1, u32::MAX, 0).next_minor(), None);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(
            Version::new(0, 0, 0).with_suffix("dev.main").to_string(),
            "0.0.0-dev.main"
        );
    }

    #[test]
    fn test_pip_compatible_string() {
        assert_eq!(
            Version::parse("1.2.0-dev.foo").unwrap().to_pip_compatible_string(),
            "1.2.0.dev1+foo"
        );
        assert_eq!(
            Version::parse("1.2.0-dev").unwrap().to_pip_compatible_string(),
            "1.2.0.dev1"
        );
        assert_eq!(Version::new(1, 2, 0).to_pip_compatible_string(), "1.2.0");
    }
}
