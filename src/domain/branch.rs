use std::fmt;

/// Branch names that always count as main branches
pub const MAIN_BRANCH_NAMES: &[&str] = &["master", "main"];

/// Branch types (first path segment) releases may be created from
pub const RELEASE_BRANCH_TYPES: &[&str] = &["release", "production"];

/// Name used when HEAD is detached or the repository has no commits yet
pub const DETACHED_HEAD: &str = "HEAD";

/// Current git branch split into its type and name.
///
/// `feature/foo/bar` has type `feature` and name `foo-bar`; `main` has an empty
/// type and the name `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub kind: String,
}

impl Branch {
    /// Create a branch descriptor from the full branch path
    pub fn new(full_name: impl AsRef<str>) -> Self {
        let full_name = full_name.as_ref().trim();
        let full_name = if full_name.is_empty() {
            DETACHED_HEAD
        } else {
            full_name
        };

        match full_name.split_once('/') {
            Some((kind, rest)) => Branch {
                name: rest.split('/').collect::<Vec<_>>().join("-"),
                kind: kind.to_string(),
            },
            None => Branch {
                name: full_name.to_string(),
                kind: String::new(),
            },
        }
    }

    /// Check if this is one of the given main branches (case-insensitive)
    pub fn is_main<S: AsRef<str>>(&self, main_branches: &[S]) -> bool {
        self.kind.is_empty()
            && main_branches
                .iter()
                .any(|b| b.as_ref().eq_ignore_ascii_case(&self.name))
    }

    /// Check if this branch's type is one of the given release types (case-insensitive)
    pub fn has_release_type<S: AsRef<str>>(&self, release_types: &[S]) -> bool {
        !self.kind.is_empty()
            && release_types
                .iter()
                .any(|t| t.as_ref().eq_ignore_ascii_case(&self.kind))
    }

    /// Version suffix marking dev builds of this branch: `dev.<name>`
    pub fn dev_suffix(&self) -> String {
        dev_suffix(&self.name)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.kind, self.name)
        }
    }
}

/// Build the dev suffix for a branch name.
///
/// Characters outside `[0-9A-Za-z-]` are replaced by `-` so the suffix stays a
/// valid version segment. An empty name yields plain `dev`.
pub fn dev_suffix(branch_name: &str) -> String {
    let segment: String = branch_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();

    if segment.is_empty() {
        "dev".to_string()
    } else {
        format!("dev.{}", segment)
    }
}
