use serial_test::serial;
use universal_build::args::{FlagSpec, Schema};
use universal_build::exit::ExitCode;
use universal_build::git::MockTagSource;
use universal_build::resolver::ResolveError;
use universal_build::sanitizer::{ReleasePolicy, Sanitizer};
use universal_build::BuildError;

const TAGS: [&str; 5] = [
    "v1.0.0",
    "v1.1.3",
    "v2.1.0",
    "v1.2.0-dev.foo-branch",
    "v1.0.0-dev",
];

fn main_branch() -> MockTagSource {
    MockTagSource::new().with_branch("main").with_tags(TAGS)
}

fn strict() -> ReleasePolicy {
    ReleasePolicy {
        strict_dev_versions: true,
        ..ReleasePolicy::default()
    }
}

struct EnvGuard(Vec<&'static str>);

impl EnvGuard {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        EnvGuard(vars.iter().map(|(name, _)| *name).collect())
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for name in &self.0 {
            std::env::remove_var(name);
        }
    }
}

#[test]
#[serial]
fn test_release_with_higher_patch() {
    let source = main_branch();
    let args = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make", "--version=1.1.4"])
        .unwrap();
    assert_eq!(args.version(), Some("1.1.4"));
    assert!(args.release());
}

#[test]
#[serial]
fn test_release_with_too_small_patch() {
    let source = main_branch();
    let err = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make", "--version=1.1.2"])
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Version(ResolveError::PatchNumberConflict { .. })
    ));
    assert_eq!(err.exit_code(), ExitCode::InvalidVersion);
}

#[test]
#[serial]
fn test_release_with_already_existing_version() {
    let source = main_branch();
    let err = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make", "--version=1.0.0"])
        .unwrap_err();
    assert_eq!(err.exit_code().code(), 2);
}

#[test]
#[serial]
fn test_release_with_invalid_version() {
    let source = main_branch();
    let err = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make", "--version=foo"])
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Version(ResolveError::InvalidFormat { .. })
    ));
}

#[test]
#[serial]
fn test_release_without_version_fails_validation() {
    let source = main_branch();
    let err = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make"])
        .unwrap_err();
    assert!(matches!(err, BuildError::InvalidArguments(_)));
    assert_eq!(err.exit_code().code(), 7);
}

#[test]
#[serial]
fn test_release_from_feature_branch_is_rejected() {
    let source = main_branch().with_branch("feature/foo-branch");
    let err = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make", "--version=3.0.0"])
        .unwrap_err();
    match err {
        BuildError::InvalidArguments(violations) => {
            assert_eq!(violations.len(), 1);
            assert!(violations[0].contains("feature/foo-branch"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
#[serial]
fn test_dev_build_reuses_branch_tag() {
    let source = main_branch().with_branch("feature/foo-branch");
    let args = Sanitizer::new(&source).sanitize(["--make"]).unwrap();
    assert_eq!(args.version(), Some("1.2.0-dev.foo-branch"));
}

#[test]
#[serial]
fn test_dev_build_predicts_next_minor() {
    let source = main_branch().with_branch("feature/bar-branch");
    let args = Sanitizer::new(&source).sanitize(["--make"]).unwrap();
    assert_eq!(args.version(), Some("2.2.0-dev.bar-branch"));
}

#[test]
#[serial]
fn test_dev_build_with_unbumpable_minor_fails() {
    let source = MockTagSource::new()
        .with_branch("feature/x")
        .with_tags(["v1.4294967295.0"]);
    let err = Sanitizer::new(&source).sanitize(["--make"]).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Version(ResolveError::MinorOverflow { .. })
    ));
    assert_eq!(err.exit_code(), ExitCode::InvalidVersion);
}

#[test]
#[serial]
fn test_requested_dev_version_gets_branch_suffix() {
    let source = main_branch().with_branch("feature/bar-branch");
    let args = Sanitizer::new(&source)
        .sanitize(["--make", "--version=2.3.0"])
        .unwrap();
    assert_eq!(args.version(), Some("2.3.0-dev.bar-branch"));
}

#[test]
#[serial]
fn test_strict_dev_build_with_release_tag_in_branch() {
    let source = main_branch()
        .with_branch("feature/bar-branch")
        .with_latest_tag("v2.1.0");
    let err = Sanitizer::new(&source)
        .with_policy(strict())
        .sanitize(["--make"])
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::DevVersionRequired);
}

#[test]
#[serial]
fn test_strict_dev_build_with_wrong_dev_tag_in_branch() {
    let source = MockTagSource::new()
        .with_branch("feature/foo")
        .with_latest_tag("v1.2.0-dev.bar-branch");
    let err = Sanitizer::new(&source)
        .with_policy(strict())
        .sanitize(["--make"])
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::DevVersionNotMatchesBranch);
}

#[test]
#[serial]
fn test_strict_dev_build_with_force() {
    let source = main_branch().with_branch("feature/bar-branch");
    let args = Sanitizer::new(&source)
        .with_policy(strict())
        .sanitize(["--make", "--force"])
        .unwrap();
    assert_eq!(args.version(), Some("2.2.0-dev.bar-branch"));
}

#[test]
#[serial]
fn test_resanitizing_serialized_arguments_is_identity() {
    let source = main_branch().with_branch("feature/foo-branch");
    let sanitizer = Sanitizer::new(&source);
    let args = sanitizer
        .sanitize(["--make", "--skip-path=docs", "--test-marker=slow"])
        .unwrap();

    let tokens: Vec<String> = args
        .to_command_line()
        .split(' ')
        .map(str::to_string)
        .collect();
    let again = sanitizer.sanitize(&tokens).unwrap();

    assert_eq!(again.version(), args.version());
    assert_eq!(again.skip_paths(), args.skip_paths());
    assert!(again.has_test_marker("slow"));
    assert_eq!(again.args(), args.args());
}

#[test]
#[serial]
fn test_version_loaded_from_env() {
    let _env = EnvGuard::set(&[("VERSION", "1.1.5")]);
    let source = main_branch();
    let args = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make"])
        .unwrap();
    assert_eq!(args.version(), Some("1.1.5"));
}

#[test]
#[serial]
fn test_input_env_variable_takes_precedence() {
    let _env = EnvGuard::set(&[("VERSION", "1.1.5"), ("INPUT_VERSION", "1.1.6")]);
    let source = main_branch();
    let args = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make"])
        .unwrap();
    assert_eq!(args.version(), Some("1.1.6"));
}

#[test]
#[serial]
fn test_command_line_beats_env() {
    let _env = EnvGuard::set(&[("INPUT_VERSION", "1.1.6")]);
    let source = main_branch();
    let args = Sanitizer::new(&source)
        .sanitize(["--release", "--test", "--make", "--version=1.1.7"])
        .unwrap();
    assert_eq!(args.version(), Some("1.1.7"));
}

#[test]
#[serial]
fn test_switches_are_not_loaded_from_env() {
    let _env = EnvGuard::set(&[("RELEASE", "true"), ("INPUT_FORCE", "true")]);
    let source = main_branch();
    let args = Sanitizer::new(&source).sanitize(["--make"]).unwrap();
    assert!(!args.release());
    assert!(!args.force());
}

#[test]
#[serial]
fn test_extension_flags_from_env() {
    let _env = EnvGuard::set(&[("INPUT_DEPLOYMENT_TOKEN", "secret")]);
    let source = main_branch();
    let schema = Schema::base().extend([
        FlagSpec::value("deployment_token", "A custom token").with_default(""),
        FlagSpec::value("my_token", "Another token"),
        FlagSpec::switch("my_bool", "A custom bool"),
    ]);
    let args = Sanitizer::new(&source)
        .with_schema(schema)
        .sanitize(["--make", "--my-token=abc", "--my_bool"])
        .unwrap();

    assert_eq!(args.value("deployment_token"), Some("secret"));
    assert_eq!(args.value("my-token"), Some("abc"));
    assert!(args.flag("my_bool"));
}
