//! Argument sanitation for component build entry points
//!
//! A build entry point hands its raw command-line tokens to a [`Sanitizer`] and
//! receives an immutable [`SanitizedArgs`]: defaults applied, string flags loaded
//! from the environment, flag combinations validated and the build version resolved.
//! Sanitized arguments carry the internal `_sanitized` marker, so a child build that
//! is called with a parent's serialized arguments accepts them unchanged.

use crate::args::{
    ArgValue, ArgumentSet, FlagKind, FlagSpec, ParsedArgs, Schema, FLAG_CHECK, FLAG_FORCE,
    FLAG_MAKE, FLAG_RELEASE, FLAG_RUN, FLAG_SANITIZED, FLAG_SKIP_PATH, FLAG_TEST,
    FLAG_TEST_MARKER, FLAG_VERSION,
};
use crate::boundary::BuildWarning;
use crate::cmdline;
use crate::domain::branch::{MAIN_BRANCH_NAMES, RELEASE_BRANCH_TYPES};
use crate::domain::{Branch, Version};
use crate::error::{BuildError, Result};
use crate::exit::exit_with;
use crate::git::{self, TagSource};
use crate::resolver::{VersionRequest, VersionResolver};
use std::fmt;
use tracing::{debug, error, info};

/// Prefix of environment variables injected by CI platforms for action inputs
pub const INPUT_ENV_PREFIX: &str = "INPUT_";

/// Which branches may release and how dev versions are derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePolicy {
    pub main_branches: Vec<String>,
    pub release_branch_types: Vec<String>,
    pub strict_dev_versions: bool,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        ReleasePolicy {
            main_branches: MAIN_BRANCH_NAMES.iter().map(|s| s.to_string()).collect(),
            release_branch_types: RELEASE_BRANCH_TYPES.iter().map(|s| s.to_string()).collect(),
            strict_dev_versions: false,
        }
    }
}

impl ReleasePolicy {
    /// Whether builds on `branch` may release
    pub fn allows_release(&self, branch: &Branch) -> bool {
        branch.is_main(&self.main_branches) || branch.has_release_type(&self.release_branch_types)
    }
}

/// Value of a string flag from the environment: `KEY`, overridden by `INPUT_KEY`.
///
/// Empty variables are ignored.
pub fn env_override(spec: &FlagSpec) -> Option<String> {
    let name = spec.env_var();
    let mut value = None;
    for var in [name.clone(), format!("{}{}", INPUT_ENV_PREFIX, name)] {
        if let Some(found) = std::env::var(&var).ok().filter(|v| !v.is_empty()) {
            debug!("Loaded --{} from {}", spec.long(), var);
            value = Some(found);
        }
    }
    value
}

/// Validated, version-resolved build arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedArgs(ArgumentSet);

impl SanitizedArgs {
    pub fn make(&self) -> bool {
        self.0.flag(FLAG_MAKE)
    }

    pub fn test(&self) -> bool {
        self.0.flag(FLAG_TEST)
    }

    pub fn check(&self) -> bool {
        self.0.flag(FLAG_CHECK)
    }

    pub fn release(&self) -> bool {
        self.0.flag(FLAG_RELEASE)
    }

    pub fn run(&self) -> bool {
        self.0.flag(FLAG_RUN)
    }

    pub fn force(&self) -> bool {
        self.0.flag(FLAG_FORCE)
    }

    /// Resolved build version
    pub fn version(&self) -> Option<&str> {
        self.0.value(FLAG_VERSION)
    }

    pub fn skip_paths(&self) -> &[String] {
        self.0.list(FLAG_SKIP_PATH)
    }

    pub fn test_markers(&self) -> &[String] {
        self.0.list(FLAG_TEST_MARKER)
    }

    pub fn has_test_marker(&self, marker: &str) -> bool {
        self.test_markers().iter().any(|m| m == marker)
    }

    /// Boolean value of any flag, including extension flags
    pub fn flag(&self, key: &str) -> bool {
        self.0.flag(key)
    }

    /// String value of any flag, including extension flags
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.value(key)
    }

    pub fn args(&self) -> &ArgumentSet {
        &self.0
    }

    pub fn into_inner(self) -> ArgumentSet {
        self.0
    }

    /// Copy with `key` set to `value`
    pub fn with_flag(&self, key: &str, value: bool) -> Self {
        SanitizedArgs(self.0.clone().with(key, ArgValue::Bool(value)))
    }

    /// Copy with the string flag `key` set to `value`
    pub fn with_value(&self, key: &str, value: impl Into<String>) -> Self {
        SanitizedArgs(self.0.clone().with(key, ArgValue::Str(value.into())))
    }

    /// Serialized flags for a child build
    pub fn to_command_line(&self) -> String {
        cmdline::to_command_line(&self.0)
    }
}

impl fmt::Display for SanitizedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Turns raw command-line tokens into [`SanitizedArgs`]
pub struct Sanitizer<'a> {
    source: &'a dyn TagSource,
    schema: Schema,
    policy: ReleasePolicy,
}

impl<'a> Sanitizer<'a> {
    /// Sanitizer for the base flag schema and the default release policy
    pub fn new(source: &'a dyn TagSource) -> Self {
        Sanitizer {
            source,
            schema: Schema::base(),
            policy: ReleasePolicy::default(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Sanitize `tokens` (without the program name)
    pub fn sanitize<I, S>(&self, tokens: I) -> Result<SanitizedArgs>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(|t| t.as_ref().to_string()).collect();
        let parsed = self.schema.parse(&tokens)?;
        for token in &parsed.ignored {
            debug!(
                "{}",
                BuildWarning::IgnoredArgument {
                    token: token.clone()
                }
            );
        }

        let mut args = parsed.args.clone();
        if tokens.is_empty() {
            // Bare invocation builds, checks and tests everything
            for key in [FLAG_MAKE, FLAG_CHECK, FLAG_TEST] {
                args.insert(key, ArgValue::Bool(true));
            }
        }
        self.load_from_env(&mut args, &parsed);

        if args.flag(FLAG_SANITIZED) {
            info!("Sanitized arguments: {}", args);
            return Ok(SanitizedArgs(args));
        }

        let violations = self.invalid_combinations(&args)?;
        if !violations.is_empty() {
            for violation in &violations {
                error!("{}", violation);
            }
            return Err(BuildError::InvalidArguments(violations));
        }

        let version = self.resolve_version(&args)?;
        args.insert(FLAG_VERSION, ArgValue::Str(version.to_string()));
        args.insert(FLAG_SANITIZED, ArgValue::Bool(true));

        info!("Sanitized arguments: {}", args);
        Ok(SanitizedArgs(args))
    }

    /// Sanitize `tokens`, terminating the process with the error's exit code on failure
    pub fn sanitize_or_exit<I, S>(&self, tokens: I) -> SanitizedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.sanitize(tokens) {
            Ok(args) => args,
            Err(e) => {
                error!("{}", e);
                exit_with(e.exit_code())
            }
        }
    }

    /// Sanitize the arguments of the current process
    pub fn parse_arguments(&self) -> SanitizedArgs {
        self.sanitize_or_exit(std::env::args().skip(1))
    }

    /// Fill string flags not given on the command line from `KEY`, then `INPUT_KEY`
    fn load_from_env(&self, args: &mut ArgumentSet, parsed: &ParsedArgs) {
        for spec in self.schema.flags() {
            if spec.kind != FlagKind::Value || parsed.is_explicit(&spec.key) {
                continue;
            }

            if let Some(value) = env_override(spec) {
                args.insert(&spec.key, ArgValue::Str(value));
            }
        }
    }

    /// Every violated release rule, in a fixed order
    fn invalid_combinations(&self, args: &ArgumentSet) -> Result<Vec<String>> {
        let mut violations = Vec::new();
        if !args.flag(FLAG_RELEASE) || args.flag(FLAG_FORCE) {
            return Ok(violations);
        }

        if args.value(FLAG_VERSION).filter(|v| !v.is_empty()).is_none() {
            violations.push(
                "Please provide a version for deployment (--version=MAJOR.MINOR.PATCH-TAG)"
                    .to_string(),
            );
        }
        if !args.flag(FLAG_TEST) {
            violations.push("Test must be executed before release (use --test)".to_string());
        }
        if !args.flag(FLAG_MAKE) {
            violations.push("Make must be executed before release (use --make)".to_string());
        }

        let branch = git::current_branch(self.source)?;
        if !self.policy.allows_release(&branch) {
            violations.push(format!(
                "Releases are only allowed on the branches {} or on branches of type {} (current branch: {})",
                self.policy.main_branches.join(", "),
                self.policy.release_branch_types.join(", "),
                branch
            ));
        }

        Ok(violations)
    }

    fn resolve_version(&self, args: &ArgumentSet) -> Result<Version> {
        let existing = git::existing_versions(self.source)?;
        let branch = git::current_branch(self.source)?;
        let latest = if self.policy.strict_dev_versions {
            git::latest_version(self.source)?
        } else {
            None
        };

        let mut resolver = VersionResolver::new(&existing, &branch);
        if self.policy.strict_dev_versions {
            resolver = resolver.strict(latest.as_ref());
        }

        let request = VersionRequest {
            requested: args.value(FLAG_VERSION),
            force: args.flag(FLAG_FORCE),
            release: args.flag(FLAG_RELEASE),
        };
        Ok(resolver.resolve(&request)?)
    }
}
