use std::fs;
use tempfile::TempDir;
use universal_build::cli::orchestration::{release_phase_args, run_build_workflow};
use universal_build::config::BuildConfig;
use universal_build::dispatcher::BuildOutcome;
use universal_build::git::MockTagSource;
use universal_build::runner::MockRunner;
use universal_build::{BuildError, SanitizedArgs, Sanitizer};

fn config(components: &[&str]) -> BuildConfig {
    BuildConfig {
        components: components.iter().map(|c| c.to_string()).collect(),
        ..BuildConfig::default()
    }
}

fn sanitize(source: &MockTagSource, tokens: &[&str]) -> SanitizedArgs {
    Sanitizer::new(source).sanitize(tokens).unwrap()
}

#[test]
fn test_dev_build_dispatches_once_without_tagging() {
    let source = MockTagSource::new().with_branch("feature/foo");
    let runner = MockRunner::new();
    let args = sanitize(&source, &["--make", "--test"]);

    let result = run_build_workflow(&args, &config(&["backend", "webapp"]), &source, &runner)
        .unwrap();

    assert_eq!(result.version, "0.0.0-dev.foo");
    assert_eq!(result.tag, None);
    assert_eq!(
        result.outcomes,
        vec![
            ("backend".to_string(), BuildOutcome::Built),
            ("webapp".to_string(), BuildOutcome::Built),
        ]
    );
    assert_eq!(runner.calls().len(), 2);
    assert!(source.created_tags().is_empty());
}

#[test]
fn test_dev_build_tags_when_configured() {
    let source = MockTagSource::new().with_branch("feature/foo");
    let runner = MockRunner::new();
    let args = sanitize(&source, &["--make"]);
    let mut config = config(&["backend"]);
    config.tagging.tag_dev_builds = true;
    config.tagging.push = false;

    let first = run_build_workflow(&args, &config, &source, &runner).unwrap();
    // Dev tags are moved on rebuilds
    let second = run_build_workflow(&args, &config, &source, &runner).unwrap();

    assert_eq!(first.tag.as_deref(), Some("v0.0.0-dev.foo"));
    assert_eq!(second.tag, first.tag);
    assert_eq!(source.created_tags(), vec!["v0.0.0-dev.foo"]);
    assert!(source.pushed_tags().is_empty());
}

#[test]
fn test_release_runs_two_phases_and_tags() {
    let source = MockTagSource::new()
        .with_branch("main")
        .with_tags(["v1.0.0"]);
    let runner = MockRunner::new();
    let args = sanitize(&source, &["--make", "--test", "--release", "--version=1.1.0"]);

    let result = run_build_workflow(&args, &config(&["backend"]), &source, &runner).unwrap();

    let commands = runner.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].contains("--make"));
    assert!(!commands[0].contains("--release"));
    assert!(commands[1].contains("--release"));
    assert!(commands[1].contains("--force"));
    assert!(!commands[1].contains("--make"));
    assert!(!commands[1].contains("--test"));

    assert_eq!(result.tag.as_deref(), Some("v1.1.0"));
    assert_eq!(source.pushed_tags(), vec!["v1.1.0"]);
}

#[test]
fn test_failed_verification_phase_stops_release() {
    let source = MockTagSource::new().with_branch("main");
    let runner = MockRunner::new().with_response("--make", 1, "");
    let args = sanitize(&source, &["--make", "--test", "--release", "--version=1.0.0"]);

    let err = run_build_workflow(&args, &config(&["backend", "webapp"]), &source, &runner)
        .unwrap_err();

    assert!(matches!(err, BuildError::ComponentFailed { .. }));
    assert_eq!(runner.calls().len(), 1);
    assert!(source.created_tags().is_empty());
}

#[test]
fn test_release_bumps_version_files() {
    let dir = TempDir::new().unwrap();
    let readme = dir.path().join("README.md");
    fs::write(&readme, "image: app:1.0.0\n").unwrap();

    let source = MockTagSource::new()
        .with_branch("main")
        .with_tags(["v1.0.0"])
        .with_latest_tag("v1.0.0");
    let runner = MockRunner::new();
    let args = sanitize(&source, &["--make", "--test", "--release", "--version=1.0.1"]);
    let mut config = config(&[]);
    config.release.version_files = vec![readme.display().to_string()];

    run_build_workflow(&args, &config, &source, &runner).unwrap();
    assert_eq!(fs::read_to_string(&readme).unwrap(), "image: app:1.0.1\n");
}

#[test]
fn test_release_phase_args() {
    let source = MockTagSource::new().with_branch("main");
    let args = sanitize(&source, &["--make", "--check", "--test", "--release", "--version=1.0.0"]);
    let phase = release_phase_args(&args);

    assert!(!phase.make());
    assert!(!phase.check());
    assert!(!phase.test());
    assert!(phase.release());
    assert!(phase.force());
    assert_eq!(phase.version(), Some("1.0.0"));
}
