use crate::dispatcher::DEFAULT_ENTRY_POINT;
use crate::domain::branch::{MAIN_BRANCH_NAMES, RELEASE_BRANCH_TYPES};
use crate::error::{BuildError, Result};
use crate::sanitizer::ReleasePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "universal-build.toml";

/// Represents the complete configuration for universal-build.
///
/// Contains the components the root build dispatches to, how component builds are
/// started, the release policy, version resolution and tagging options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct BuildConfig {
    /// Component directories, built in this order
    #[serde(default)]
    pub components: Vec<String>,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub release: ReleaseSection,

    #[serde(default)]
    pub versioning: VersioningSection,

    #[serde(default)]
    pub tagging: TaggingSection,
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

/// How component builds are started
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildSection {
    /// Command run inside each component directory
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Time limit for a single component build
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BuildSection {
    fn default() -> Self {
        BuildSection {
            entry_point: default_entry_point(),
            timeout_secs: None,
        }
    }
}

impl BuildSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_main_branches() -> Vec<String> {
    MAIN_BRANCH_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_branch_types() -> Vec<String> {
    RELEASE_BRANCH_TYPES.iter().map(|s| s.to_string()).collect()
}

/// Branches releases may be created from
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseSection {
    #[serde(default = "default_main_branches")]
    pub main_branches: Vec<String>,

    #[serde(default = "default_branch_types")]
    pub branch_types: Vec<String>,

    /// Files in which the previous version is replaced by the released one
    #[serde(default)]
    pub version_files: Vec<String>,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        ReleaseSection {
            main_branches: default_main_branches(),
            branch_types: default_branch_types(),
            version_files: Vec::new(),
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VersioningSection {
    /// Remote whose tags record released versions
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Require an existing tag for dev builds instead of predicting the next minor version
    #[serde(default)]
    pub strict_dev_versions: bool,
}

impl Default for VersioningSection {
    fn default() -> Self {
        VersioningSection {
            remote: default_remote(),
            strict_dev_versions: false,
        }
    }
}

fn default_push() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TaggingSection {
    /// Also tag dev builds with their branch version
    #[serde(default)]
    pub tag_dev_builds: bool,

    /// Push created tags to the remote
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for TaggingSection {
    fn default() -> Self {
        TaggingSection {
            tag_dev_builds: false,
            push: default_push(),
        }
    }
}

impl BuildConfig {
    /// Release policy applied by the argument sanitizer
    pub fn release_policy(&self) -> ReleasePolicy {
        ReleasePolicy {
            main_branches: self.release.main_branches.clone(),
            release_branch_types: self.release.branch_types.clone(),
            strict_dev_versions: self.versioning.strict_dev_versions,
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `universal-build.toml` in current directory
/// 3. `universal-build.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Errors
/// Fails if a file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&str>) -> Result<BuildConfig> {
    let candidate = match config_path {
        Some(path) => Some(Path::new(path).to_path_buf()),
        None => {
            let local = Path::new(".").join(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                dirs::config_dir()
                    .map(|dir| dir.join(CONFIG_FILE_NAME))
                    .filter(|path| path.exists())
            }
        }
    };

    let Some(path) = candidate else {
        return Ok(BuildConfig::default());
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| BuildError::config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| BuildError::config(format!("cannot parse {}: {}", path.display(), e)))
}
