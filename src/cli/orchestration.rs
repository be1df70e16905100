//! Main workflow orchestration logic
//!
//! The root build entry point sanitizes its arguments once, then dispatches every
//! configured component with them. A release runs in two phases: first everything
//! is built and tested without releasing, then the components are called again
//! with only the release step enabled. The resolved version is recorded as a git
//! tag afterwards.

use crate::args::{FLAG_CHECK, FLAG_FORCE, FLAG_MAKE, FLAG_RELEASE, FLAG_TEST};
use crate::config::BuildConfig;
use crate::dispatcher::{BuildOutcome, Dispatcher};
use crate::domain::Version;
use crate::error::{BuildError, Result};
use crate::git::{self, TagSource};
use crate::helpers::replace_in_files;
use crate::resolver::ResolveError;
use crate::runner::CommandRunner;
use crate::sanitizer::SanitizedArgs;
use tracing::info;

/// Result of a successful build workflow
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    /// Version the build ran with
    pub version: String,

    /// Outcome per component of the last phase, in build order
    pub outcomes: Vec<(String, BuildOutcome)>,

    /// Tag created for the version, if any
    pub tag: Option<String>,
}

/// Arguments of the second release phase: release only, without re-validation
pub fn release_phase_args(args: &SanitizedArgs) -> SanitizedArgs {
    args.with_flag(FLAG_MAKE, false)
        .with_flag(FLAG_CHECK, false)
        .with_flag(FLAG_TEST, false)
        .with_flag(FLAG_RELEASE, true)
        .with_flag(FLAG_FORCE, true)
}

/// Main build workflow
///
/// 1. Dispatch all components (with `release` disabled when releasing)
/// 2. For releases, bump the version files and dispatch again in release-only mode
/// 3. Tag the version on release (and on dev builds when configured)
pub fn run_build_workflow(
    args: &SanitizedArgs,
    config: &BuildConfig,
    source: &dyn TagSource,
    runner: &dyn CommandRunner,
) -> Result<WorkflowResult> {
    let version_text = args
        .version()
        .ok_or(BuildError::Version(ResolveError::VersionRequiredForRelease))?;
    let version: Version = version_text.parse()?;

    let dispatcher = Dispatcher::new(runner)
        .with_entry_point(config.build.entry_point.clone())
        .with_timeout(config.build.timeout());

    let outcomes = if args.release() {
        info!("Verifying build and tests before release");
        dispatch(&dispatcher, &config.components, &args.with_flag(FLAG_RELEASE, false))?;

        bump_version_files(config, source, &version)?;

        info!("Releasing version {}", version);
        dispatch(&dispatcher, &config.components, &release_phase_args(args))?
    } else {
        dispatch(&dispatcher, &config.components, args)?
    };

    let tag = if args.release() || config.tagging.tag_dev_builds {
        // Dev tags follow the branch and are moved on every build
        let force = args.force() || !args.release();
        let tag = git::create_version_tag(source, &version, config.tagging.push, force)?;
        Some(tag.name)
    } else {
        None
    };

    Ok(WorkflowResult {
        version: version.to_string(),
        outcomes,
        tag,
    })
}

fn dispatch(
    dispatcher: &Dispatcher<'_>,
    components: &[String],
    args: &SanitizedArgs,
) -> Result<Vec<(String, BuildOutcome)>> {
    components
        .iter()
        .map(|component| Ok((component.clone(), dispatcher.build(component, args)?)))
        .collect()
}

fn bump_version_files(config: &BuildConfig, source: &dyn TagSource, version: &Version) -> Result<()> {
    if config.release.version_files.is_empty() {
        return Ok(());
    }

    match git::latest_version(source)? {
        Some(previous) if previous != *version => {
            info!(
                "Replacing version {} with {} in {} files",
                previous,
                version,
                config.release.version_files.len()
            );
            replace_in_files(
                &previous.to_string(),
                &version.to_string(),
                &config.release.version_files,
                false,
            )
        }
        _ => Ok(()),
    }
}
