use std::fmt;

/// Non-fatal conditions encountered while preparing a build.
/// These are reported to the user but never abort the build.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    /// Tag exists but cannot be parsed as a version
    UnparsableTag { tag: String },
    /// Remote tags were not queried because no token is configured
    RemoteTagsSkipped,
    /// Command-line token not recognized by the flag schema
    IgnoredArgument { token: String },
    /// Component build skipped because it lies under a skip path
    ComponentSkipped { path: String, skip_path: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::UnparsableTag { tag } => {
                write!(f, "Ignoring tag '{}': not a version", tag)
            }
            BuildWarning::RemoteTagsSkipped => {
                write!(
                    f,
                    "GITHUB_TOKEN is not set, remote version tags are not considered"
                )
            }
            BuildWarning::IgnoredArgument { token } => {
                write!(f, "Ignoring unrecognized argument '{}'", token)
            }
            BuildWarning::ComponentSkipped { path, skip_path } => {
                write!(f, "Skipping build of '{}' (skip path '{}')", path, skip_path)
            }
        }
    }
}
