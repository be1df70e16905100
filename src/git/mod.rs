//! Git tag source abstraction layer
//!
//! Version resolution only needs a narrow view of the repository: the version tags
//! known to the remote, the current branch and the latest tag reachable from HEAD.
//! The [TagSource] trait captures that view so the sanitizer can be driven by a real
//! repository ([repository::Git2TagSource]) or by an in-memory fake
//! ([mock::MockTagSource]).

pub mod mock;
pub mod repository;

pub use mock::MockTagSource;
pub use repository::Git2TagSource;

use crate::boundary::BuildWarning;
use crate::domain::tag::{sort_version_tags, Tag};
use crate::domain::{Branch, Version};
use crate::error::Result;
use tracing::{debug, info};

/// Environment variable that enables remote tag lookups
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Read/append access to the git state a build depends on
pub trait TagSource {
    /// Tag names advertised by the remote (`refs/tags/...` or short names).
    ///
    /// An empty list is a valid answer; implementations may skip the remote lookup
    /// entirely when no credentials are configured.
    fn remote_tags(&self) -> Result<Vec<String>>;

    /// Full name of the checked out branch (e.g. `feature/foo`), or `HEAD` when detached
    fn current_branch(&self) -> Result<String>;

    /// Latest `v[0-9]*` tag reachable from HEAD, if any
    fn latest_branch_tag(&self) -> Result<Option<String>>;

    /// Create an annotated tag on HEAD; `force` overwrites an existing tag
    fn create_tag(&self, tag: &Tag, force: bool) -> Result<()>;

    /// Push a tag to the remote; `force` replaces the remote tag
    fn push_tag(&self, tag: &Tag, force: bool) -> Result<()>;
}

/// Versions recorded as remote tags, freshest first
pub fn existing_versions(source: &dyn TagSource) -> Result<Vec<Version>> {
    let tags = source.remote_tags()?;
    let (versions, ignored) = sort_version_tags(&tags);

    for tag in ignored {
        debug!("{}", BuildWarning::UnparsableTag { tag });
    }

    Ok(versions)
}

/// Branch descriptor for the checked out branch
pub fn current_branch(source: &dyn TagSource) -> Result<Branch> {
    Ok(Branch::new(source.current_branch()?))
}

/// Latest version tag on the current branch
pub fn latest_version(source: &dyn TagSource) -> Result<Option<Version>> {
    Ok(source
        .latest_branch_tag()?
        .and_then(|tag| Tag::new(tag).version()))
}

/// Tag HEAD with `v{version}` and optionally push it.
///
/// The push only happens when tag creation succeeded.
pub fn create_version_tag(
    source: &dyn TagSource,
    version: &Version,
    push: bool,
    force: bool,
) -> Result<Tag> {
    let tag = Tag::for_version(version);
    source.create_tag(&tag, force)?;
    info!("Created tag {}", tag.name);

    if push {
        source.push_tag(&tag, force)?;
        info!("Pushed tag {}", tag.name);
    }

    Ok(tag)
}
