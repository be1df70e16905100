//! Version resolution for a single build invocation
//!
//! Decides which [`Version`] a build uses from an explicit request, the versions
//! recorded as git tags, the current branch and the `force` / `release` flags.

use crate::domain::{Branch, Version};
use crate::exit::ExitCode;
use thiserror::Error;

/// Reasons a version could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("The provided version {version} is not in a valid format. Valid formats include 1.0.0, 1.0.0-dev or 1.0.0-dev.foo")]
    InvalidFormat { version: String },

    #[error("A version ({existing}) with the same or higher patch version as provided ({requested}) already exists.")]
    PatchNumberConflict { requested: String, existing: String },

    #[error("The version {version} cannot be followed by a next minor version.")]
    MinorOverflow { version: String },

    #[error("For a release a valid semantic version has to be set.")]
    VersionRequiredForRelease,

    #[error("No version tag found for branch '{branch}'. Provide a version via --version.")]
    NoVersionFound { branch: String },

    #[error("The latest version on branch '{branch}' is the release {latest}. Please provide a dev version for this branch (--version) or use --force.")]
    DevVersionRequired { branch: String, latest: String },

    #[error("The latest dev version {latest} does not belong to branch '{branch}'. Please provide a dev version for this branch (--version) or use --force.")]
    DevVersionNotMatchesBranch { branch: String, latest: String },
}

impl ResolveError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ResolveError::InvalidFormat { .. }
            | ResolveError::PatchNumberConflict { .. }
            | ResolveError::MinorOverflow { .. } => ExitCode::InvalidVersion,
            ResolveError::VersionRequiredForRelease => ExitCode::VersionIsRequired,
            ResolveError::NoVersionFound { .. } => ExitCode::NoVersionFound,
            ResolveError::DevVersionRequired { .. } => ExitCode::DevVersionRequired,
            ResolveError::DevVersionNotMatchesBranch { .. } => {
                ExitCode::DevVersionNotMatchesBranch
            }
        }
    }
}

/// Flags of the build invocation that influence version resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionRequest<'a> {
    /// Explicitly requested version; an empty string counts as absent
    pub requested: Option<&'a str>,
    pub force: bool,
    pub release: bool,
}

/// Resolves the version for the current build
#[derive(Debug, Clone)]
pub struct VersionResolver<'a> {
    existing_versions: &'a [Version],
    branch: &'a Branch,
    latest_branch_version: Option<&'a Version>,
    strict_dev_versions: bool,
}

impl<'a> VersionResolver<'a> {
    /// `existing_versions` must be ordered freshest first
    pub fn new(existing_versions: &'a [Version], branch: &'a Branch) -> Self {
        VersionResolver {
            existing_versions,
            branch,
            latest_branch_version: None,
            strict_dev_versions: false,
        }
    }

    /// Require an existing dev tag for unforced dev builds without a requested version.
    ///
    /// `latest_branch_version` is the latest version tag reachable from the branch head.
    pub fn strict(mut self, latest_branch_version: Option<&'a Version>) -> Self {
        self.strict_dev_versions = true;
        self.latest_branch_version = latest_branch_version;
        self
    }

    pub fn resolve(&self, request: &VersionRequest<'_>) -> Result<Version, ResolveError> {
        let requested = request.requested.filter(|v| !v.is_empty());

        match requested {
            Some(text) => {
                let mut version = validate_version(text, request.force, self.existing_versions)?;
                if !request.release && !request.force {
                    version.suffix = self.branch.dev_suffix();
                }
                Ok(version)
            }
            None if request.release => Err(ResolveError::VersionRequiredForRelease),
            None => self.resolve_dev_version(request.force),
        }
    }

    fn resolve_dev_version(&self, force: bool) -> Result<Version, ResolveError> {
        let dev_suffix = self.branch.dev_suffix();

        if let Some(version) = branch_version(self.existing_versions, self.branch) {
            return Ok(version.clone());
        }

        if self.strict_dev_versions && !force {
            return self.strict_branch_version(&dev_suffix);
        }

        match self.existing_versions.first() {
            Some(latest) => latest
                .next_minor()
                .map(|next| next.with_suffix(dev_suffix))
                .ok_or_else(|| ResolveError::MinorOverflow {
                    version: latest.to_string(),
                }),
            None => Ok(Version::new(0, 0, 0).with_suffix(dev_suffix)),
        }
    }

    fn strict_branch_version(&self, dev_suffix: &str) -> Result<Version, ResolveError> {
        let branch = self.branch.name.clone();
        let latest = self
            .latest_branch_version
            .ok_or(ResolveError::NoVersionFound {
                branch: branch.clone(),
            })?;

        if latest.suffix == dev_suffix {
            Ok(latest.clone())
        } else if latest.suffix.starts_with("dev") {
            Err(ResolveError::DevVersionNotMatchesBranch {
                branch,
                latest: latest.to_string(),
            })
        } else {
            Err(ResolveError::DevVersionRequired {
                branch,
                latest: latest.to_string(),
            })
        }
    }
}

/// Parse `text` and check it against the existing versions.
///
/// A requested version conflicts with an existing release of the same
/// `major.minor` line whose patch is equal or higher, unless `force` is set.
/// Suffixed (dev) versions never conflict.
pub fn validate_version(
    text: &str,
    force: bool,
    existing_versions: &[Version],
) -> Result<Version, ResolveError> {
    let version: Version = text.parse()?;

    if force {
        return Ok(version);
    }

    let conflict = existing_versions.iter().find(|existing| {
        existing.is_release()
            && existing.major == version.major
            && existing.minor == version.minor
            && existing.patch >= version.patch
    });

    match conflict {
        Some(existing) => Err(ResolveError::PatchNumberConflict {
            requested: version.to_string(),
            existing: existing.to_string(),
        }),
        None => Ok(version),
    }
}

/// First existing version carrying this branch's dev suffix
pub fn branch_version<'v>(existing_versions: &'v [Version], branch: &Branch) -> Option<&'v Version> {
    let dev_suffix = branch.dev_suffix();
    existing_versions.iter().find(|v| v.suffix == dev_suffix)
}
