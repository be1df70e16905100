use crate::args::{FlagSpec, Schema};
use crate::domain::Version;
use crate::error::{BuildError, Result};
use crate::runner::{require_command, CommandOutput, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Extension flag naming the registry / organization images are released to
pub const FLAG_DOCKER_IMAGE_PREFIX: &str = "docker_image_prefix";

pub const HADOLINT_CONFIG: &str = ".hadolint.yml";

const LATEST_TAG: &str = "latest";

/// Flag schema of Docker component builds: the base flags plus `--docker-image-prefix`
pub fn schema() -> Schema {
    Schema::base().extend([FlagSpec::value(
        FLAG_DOCKER_IMAGE_PREFIX,
        "Prefix for the Docker image, e.g. 'mltooling/' or a repository path. Leave blank for the default DockerHub repository.",
    )
    .with_default("")])
}

/// `prefix/name:tag`, or `name:tag` without a prefix
pub fn image_name(name: &str, tag: &str, prefix: &str) -> String {
    let versioned = format!("{}:{}", name.trim(), tag.trim());
    let prefix = prefix.trim().trim_end_matches('/');
    if prefix.is_empty() {
        versioned
    } else {
        format!("{}/{}", prefix, versioned)
    }
}

/// Docker build steps for the component in `dir`
pub struct Docker<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
    require_tools: bool,
}

impl<'a> Docker<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl AsRef<Path>) -> Self {
        Docker {
            runner,
            dir: dir.as_ref().to_path_buf(),
            require_tools: true,
        }
    }

    /// Do not check the `PATH` for docker, hadolint and trivy before running them
    pub fn without_tool_check(mut self) -> Self {
        self.require_tools = false;
        self
    }

    fn tool_available(&self, tool: &str) -> Result<()> {
        if self.require_tools {
            require_command(tool)
        } else {
            Ok(())
        }
    }

    fn run(&self, command: String) -> Result<CommandOutput> {
        let spec = CommandSpec::new(command)
            .in_dir(&self.dir)
            .exit_on_error(false);
        self.runner.run(&spec)?.into_result()
    }

    /// Build `name:version` and `name:latest` from the Dockerfile in the component directory.
    ///
    /// With a prefix, the versioned image is additionally tagged `prefix/name:version`.
    pub fn build_image(&self, name: &str, version: &str, build_args: &str, prefix: &str) -> Result<()> {
        self.tool_available("docker")?;

        let versioned = image_name(name, version, "");
        let latest = image_name(name, LATEST_TAG, "");
        let mut command = format!("docker build -t {} -t {}", versioned, latest);
        if !build_args.trim().is_empty() {
            command.push(' ');
            command.push_str(build_args.trim());
        }
        command.push_str(" ./");

        self.run(command).map_err(|e| {
            error!("Failed to build Docker image {}", versioned);
            e
        })?;

        if !prefix.trim().is_empty() {
            let remote = image_name(name, version, prefix);
            self.run(format!("docker tag {} {}", versioned, remote))?;
        }
        Ok(())
    }

    /// Push `prefix/name:version`; release versions are pushed as `latest` too
    pub fn release_image(&self, name: &str, version: &str, prefix: &str) -> Result<()> {
        self.tool_available("docker")?;

        if prefix.trim().is_empty() {
            return Err(BuildError::arguments(
                "The flag --docker-image-prefix cannot be blank when pushing a Docker image.",
            ));
        }

        let versioned = image_name(name, version, "");
        let remote = image_name(name, version, prefix);
        self.run(format!("docker tag {} {}", versioned, remote))?;
        self.run(format!("docker push {}", remote)).map_err(|e| {
            error!("Failed to release Docker image {}:{}", name, version);
            e
        })?;

        let is_release = Version::parse(version)
            .map(|v| v.is_release())
            .unwrap_or(!version.contains('-'));
        if is_release {
            let remote_latest = image_name(name, LATEST_TAG, prefix);
            info!("Release Docker image with latest tag as well: {}", remote_latest);
            self.run(format!("docker tag {} {}", versioned, remote_latest))?;
            self.run(format!("docker push {}", remote_latest))?;
        }
        Ok(())
    }

    /// Lint the component's Dockerfile with hadolint, using `.hadolint.yml` when present
    pub fn lint_dockerfile(&self) -> Result<()> {
        self.tool_available("hadolint")?;
        info!("Run linters and style checks:");

        let command = if self.dir.join(HADOLINT_CONFIG).exists() {
            format!("hadolint --config={} Dockerfile", HADOLINT_CONFIG)
        } else {
            "hadolint Dockerfile".to_string()
        };
        self.run(command).map(|_| ())
    }

    /// Fail on HIGH or CRITICAL vulnerabilities reported by trivy
    pub fn check_image(&self, image: &str) -> Result<()> {
        self.tool_available("trivy")?;
        info!("Run vulnerability checks on docker image:");

        self.run(format!(
            "trivy image --timeout=20m0s --exit-code 1 --severity HIGH,CRITICAL {}",
            image
        ))
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockRunner;
    use tempfile::TempDir;

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("app", "1.0.0", ""), "app:1.0.0");
        assert_eq!(image_name(" app ", "1.0.0", "mltooling/"), "mltooling/app:1.0.0");
        assert_eq!(
            image_name("app", "latest", "ghcr.io/org"),
            "ghcr.io/org/app:latest"
        );
    }

    #[test]
    fn test_schema_has_prefix_flag() {
        let parsed = schema().parse(["--docker-image-prefix=mltooling"]).unwrap();
        assert_eq!(parsed.args.value(FLAG_DOCKER_IMAGE_PREFIX), Some("mltooling"));

        let parsed = schema().parse(Vec::<String>::new()).unwrap();
        assert_eq!(parsed.args.value(FLAG_DOCKER_IMAGE_PREFIX), Some(""));
    }

    #[test]
    fn test_build_image_tags_prefixed_image() {
        let runner = MockRunner::new();
        Docker::new(&runner, ".")
            .without_tool_check()
            .build_image("app", "1.0.0", "--build-arg A=1", "org")
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "docker build -t app:1.0.0 -t app:latest --build-arg A=1 ./",
                "docker tag app:1.0.0 org/app:1.0.0",
            ]
        );
    }

    #[test]
    fn test_failed_build_skips_tagging() {
        let runner = MockRunner::new().with_response("docker build", 1, "");
        let result = Docker::new(&runner, ".")
            .without_tool_check()
            .build_image("app", "1.0.0", "", "org");
        assert!(result.is_err());
        assert_eq!(runner.commands().len(), 1);
    }

    #[test]
    fn test_release_pushes_latest_for_release_versions() {
        let runner = MockRunner::new();
        Docker::new(&runner, ".")
            .without_tool_check()
            .release_image("app", "1.0.0", "org")
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "docker tag app:1.0.0 org/app:1.0.0",
                "docker push org/app:1.0.0",
                "docker tag app:1.0.0 org/app:latest",
                "docker push org/app:latest",
            ]
        );
    }

    #[test]
    fn test_release_of_dev_version_skips_latest() {
        let runner = MockRunner::new();
        Docker::new(&runner, ".")
            .without_tool_check()
            .release_image("app", "1.1.0-dev.foo", "org")
            .unwrap();
        assert_eq!(runner.commands().len(), 2);
    }

    #[test]
    fn test_release_requires_prefix() {
        let runner = MockRunner::new();
        let err = Docker::new(&runner, ".")
            .without_tool_check()
            .release_image("app", "1.0.0", " ")
            .unwrap_err();
        assert!(err.to_string().contains("--docker-image-prefix"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_lint_uses_hadolint_config() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        let docker = Docker::new(&runner, dir.path()).without_tool_check();

        docker.lint_dockerfile().unwrap();
        std::fs::write(dir.path().join(HADOLINT_CONFIG), "ignored: []\n").unwrap();
        docker.lint_dockerfile().unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "hadolint Dockerfile",
                "hadolint --config=.hadolint.yml Dockerfile"
            ]
        );
    }

    #[test]
    fn test_check_image_fails_on_findings() {
        let runner = MockRunner::new().with_response("trivy", 1, "CRITICAL: 2");
        let err = Docker::new(&runner, ".")
            .without_tool_check()
            .check_image("app:1.0.0")
            .unwrap_err();
        assert!(err.to_string().contains("trivy image"));
    }
}
