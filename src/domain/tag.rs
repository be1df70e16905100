use crate::domain::version::Version;

/// Message attached to annotated tags created by builds
pub const TAG_MESSAGE: &str = "Automatically tagged during build process.";

/// Represents a version git tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    /// Create a new tag from a string
    pub fn new(name: impl Into<String>) -> Self {
        Tag { name: name.into() }
    }

    /// Tag recording `version`: always prefixed with `v`
    pub fn for_version(version: &Version) -> Self {
        Tag {
            name: format!("v{}", version),
        }
    }

    /// Full reference name (`refs/tags/...`)
    pub fn refname(&self) -> String {
        format!("refs/tags/{}", self.name)
    }

    /// Extract the version from the tag, ignoring any `refs/tags/` style path prefix.
    ///
    /// Returns `None` for tags that do not resemble versions.
    pub fn version(&self) -> Option<Version> {
        let short = self.name.rsplit('/').next().unwrap_or(&self.name);
        Version::parse(short)
    }
}

/// Parse tag names into versions, freshest first.
///
/// Tags that are not versions are returned in the second list. Versions are ordered by
/// `(major, minor, patch)` descending; for equal cores a release sorts before suffixed
/// versions, and suffixes descend lexically.
pub fn sort_version_tags<S: AsRef<str>>(tags: &[S]) -> (Vec<Version>, Vec<String>) {
    let mut versions = Vec::new();
    let mut ignored = Vec::new();

    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        match Tag::new(tag).version() {
            Some(version) => versions.push(version),
            None => ignored.push(tag.to_string()),
        }
    }

    versions.sort_by(|a, b| {
        b.cmp_core(a)
            .then_with(|| b.is_release().cmp(&a.is_release()))
            .then_with(|| b.suffix.cmp(&a.suffix))
    });

    (versions, ignored)
}
