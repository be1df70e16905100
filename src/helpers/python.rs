use crate::args::{FlagSpec, Schema, TEST_MARKER_SLOW};
use crate::cmdline::quote;
use crate::domain::Version;
use crate::error::{BuildError, Result};
use crate::helpers::files::replace_in_files;
use crate::runner::{command_exists, require_command, CommandOutput, CommandRunner, CommandSpec};
use crate::sanitizer::SanitizedArgs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const FLAG_PYPI_TOKEN: &str = "pypi_token";
pub const FLAG_PYPI_REPOSITORY: &str = "pypi_repository";

/// User name twine authenticates API tokens with
pub const DEFAULT_PYPI_USER: &str = "__token__";

const PIPFILE: &str = "Pipfile";
const PIPENV_RUN: &str = "pipenv run";

/// Flag schema of Python component builds: the base flags plus the PyPI credentials
pub fn schema() -> Schema {
    Schema::base().extend([
        FlagSpec::value(FLAG_PYPI_TOKEN, "Personal access token for PyPI account.").with_default(""),
        FlagSpec::value(FLAG_PYPI_REPOSITORY, "PyPI repository for publishing artifacts.")
            .with_default(""),
    ])
}

/// Linters run by [`Python::code_checks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeChecks {
    pub black: bool,
    pub isort: bool,
    pub pydocstyle: bool,
    pub mypy: bool,
    pub flake8: bool,
    /// `pipenv check`
    pub safety: bool,
}

impl Default for CodeChecks {
    fn default() -> Self {
        CodeChecks {
            black: true,
            isort: true,
            pydocstyle: true,
            mypy: true,
            flake8: true,
            safety: true,
        }
    }
}

/// Python package build steps for the component in `dir`
pub struct Python<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
    interpreter: String,
    require_tools: bool,
}

impl<'a> Python<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl AsRef<Path>) -> Self {
        Python {
            runner,
            dir: dir.as_ref().to_path_buf(),
            interpreter: "python".to_string(),
            require_tools: true,
        }
    }

    /// Interpreter used for the build environment and `setup.py`
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Do not check the `PATH` for pipenv, twine or the linters before running them
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

    fn spec(&self, command: String) -> CommandSpec {
        CommandSpec::new(command)
            .in_dir(&self.dir)
            .exit_on_error(false)
    }

    fn run(&self, command: String) -> Result<CommandOutput> {
        self.runner.run(&self.spec(command))?.into_result()
    }

    /// Run a cleanup or informational command whose failure does not matter
    fn run_unchecked(&self, command: String) {
        match self.runner.run(&self.spec(command)) {
            Ok(output) if !output.success() => {
                warn!("`{}` exited with code {}", output.command, output.exit_code)
            }
            Ok(_) => {}
            Err(e) => warn!("{}", e),
        }
    }

    fn has_pipfile(&self) -> bool {
        self.dir.join(PIPFILE).is_file()
    }

    fn require_pipfile(&self) -> Result<()> {
        if self.has_pipfile() {
            Ok(())
        } else {
            Err(BuildError::config(format!(
                "No Pipfile discovered in {}, cannot install pipenv environment",
                self.dir.display()
            )))
        }
    }

    /// Whether the component directory has a Pipfile with an installed pipenv environment
    pub fn is_pipenv_environment(&self) -> bool {
        if !self.has_pipfile() {
            return false;
        }
        if self.require_tools && !command_exists("pipenv", true) {
            return false;
        }

        let spec = self.spec("pipenv --venv".to_string()).quiet_stdout().quiet_stderr();
        self.runner
            .run(&spec)
            .map(|output| output.success())
            .unwrap_or(false)
    }

    /// `pipenv run <tool>` inside a pipenv environment, else `<tool>` from the `PATH`
    fn tool_command(&self, pipenv: bool, tool: &str, args: &str) -> Result<String> {
        if pipenv {
            Ok(format!("{} {} {}", PIPENV_RUN, tool, args))
        } else {
            self.tool_available(tool)?;
            Ok(format!("{} {}", tool, args))
        }
    }

    /// Recreate the pipenv environment with the dev dependencies
    pub fn install_build_env(&self) -> Result<()> {
        self.require_pipfile()?;
        self.tool_available("pipenv")?;

        self.run_unchecked("pipenv --rm".to_string());
        self.run(format!(
            "pipenv install --dev --python={} --skip-lock",
            self.interpreter
        ))?;
        self.run_unchecked("pipenv graph".to_string());
        Ok(())
    }

    /// Run the selected linters on `src` and `tests`
    pub fn code_checks(&self, checks: &CodeChecks) -> Result<()> {
        info!("Run linters and style checks:");
        let pipenv = self.is_pipenv_environment();

        if checks.black {
            self.run(self.tool_command(pipenv, "black", "--check src")?)?;
            self.run(self.tool_command(pipenv, "black", "--check tests")?)?;
        }
        if checks.isort {
            self.run(self.tool_command(pipenv, "isort", "--profile black --check-only src")?)?;
            self.run(self.tool_command(pipenv, "isort", "--profile black --check-only tests")?)?;
        }
        if checks.pydocstyle {
            self.run(self.tool_command(pipenv, "pydocstyle", "src")?)?;
        }
        if checks.mypy {
            self.run(self.tool_command(pipenv, "mypy", "src")?)?;
        }
        if checks.flake8 {
            self.run(self.tool_command(pipenv, "flake8", "--show-source --statistics src")?)?;
            self.run(self.tool_command(pipenv, "flake8", "--show-source --statistics tests")?)?;
        }
        if checks.safety {
            self.tool_available("pipenv")?;
            self.run("pipenv check".to_string())?;
        }
        Ok(())
    }

    /// Run pytest in the pipenv environment.
    ///
    /// Tests marked `slow` only run when the build was started with `--test-marker=slow`.
    pub fn run_tests(&self, args: &SanitizedArgs) -> Result<()> {
        self.run_unchecked("pipenv run coverage erase".to_string());
        if args.has_test_marker(TEST_MARKER_SLOW) {
            self.run("pipenv run pytest".to_string()).map(|_| ())
        } else {
            self.run(format!("pipenv run pytest -m {}", quote("not slow")))
                .map(|_| ())
        }
    }

    /// Run pytest in a temporary pipenv environment with `python_version` (via pyenv).
    ///
    /// The environment and the pyenv version are removed again even when tests fail.
    pub fn test_with_py_version(&self, python_version: &str) -> Result<()> {
        if !self.has_pipfile() {
            info!("No Pipfile discovered. Testing with specific python version only works with pipenv.");
            return Ok(());
        }
        self.tool_available("pyenv")?;
        self.tool_available("pipenv")?;

        self.run(format!(
            "pyenv install --skip-existing {v} && pyenv local {v}",
            v = python_version
        ))?;
        let result = self
            .run(format!(
                "pipenv install --dev --python={} --skip-lock",
                python_version
            ))
            .and_then(|_| self.run("pipenv run pytest".to_string()));

        self.run_unchecked("pipenv --rm".to_string());
        self.run_unchecked(format!(
            "pyenv local --unset && pyenv uninstall -f {}",
            python_version
        ));
        result.map(|_| ())
    }

    /// Write the pip-compatible `version` into the `__version__` attribute of `module_path`
    pub fn update_version(&self, module_path: impl AsRef<Path>, version: &Version) -> Result<()> {
        let path = self.dir.join(module_path);
        replace_in_files(
            r#"__version__ = ".+""#,
            &format!(r#"__version__ = "{}""#, version.to_pip_compatible_string()),
            &[path],
            true,
        )
    }

    /// Generate markdown API docs with lazydocs
    pub fn generate_api_docs(&self, github_url: &str, main_package: &str) -> Result<()> {
        let pipenv = self.is_pipenv_environment();
        let args = format!(
            "--overview-file=README.md --src-base-url={}/blob/main {}",
            github_url.trim_end_matches('/'),
            main_package
        );
        self.run(self.tool_command(pipenv, "lazydocs", &args)?)
            .map(|_| ())
    }

    /// Build sdist and wheel into `dist/` from a clean state and verify them with twine
    pub fn build_distribution(&self) -> Result<()> {
        for stale in ["dist", "build"] {
            match fs::remove_dir_all(self.dir.join(stale)) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }

        self.run(format!(
            "{} setup.py sdist bdist_wheel clean --all",
            self.interpreter
        ))?;
        self.tool_available("twine")?;
        self.run("twine check dist/*".to_string()).map(|_| ())
    }

    /// Upload `dist/*` with twine; without a repository the production PyPI is used
    pub fn publish_pypi_distribution(
        &self,
        pypi_token: &str,
        pypi_user: &str,
        pypi_repository: Option<&str>,
    ) -> Result<()> {
        if pypi_token.trim().is_empty() {
            return Err(BuildError::arguments(
                "PyPI token is required for release (--pypi-token=<TOKEN>)",
            ));
        }
        self.tool_available("twine")?;

        let mut command = format!(
            "twine upload --non-interactive -u {} -p {}",
            quote(pypi_user),
            quote(pypi_token)
        );
        if let Some(repository) = pypi_repository.filter(|r| !r.trim().is_empty()) {
            command.push_str(&format!(" --repository-url {}", quote(repository)));
        }
        command.push_str(" dist/*");
        self.run(command).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockTagSource;
    use crate::runner::MockRunner;
    use crate::sanitizer::Sanitizer;
    use tempfile::TempDir;

    fn pipenv_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PIPFILE), "[packages]\n").unwrap();
        dir
    }

    fn sanitized(tokens: &[&str]) -> SanitizedArgs {
        let source = MockTagSource::new().with_branch("main");
        Sanitizer::new(&source).sanitize(tokens).unwrap()
    }

    #[test]
    fn test_schema_has_pypi_flags() {
        let parsed = schema()
            .parse(["--pypi-token=abc", "--pypi-repository=https://test.pypi.org/legacy/"])
            .unwrap();
        assert_eq!(parsed.args.value(FLAG_PYPI_TOKEN), Some("abc"));
        assert_eq!(
            parsed.args.value(FLAG_PYPI_REPOSITORY),
            Some("https://test.pypi.org/legacy/")
        );
    }

    #[test]
    fn test_install_build_env_requires_pipfile() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        let err = Python::new(&runner, dir.path())
            .without_tool_check()
            .install_build_env()
            .unwrap_err();
        assert!(err.to_string().contains("No Pipfile"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_install_build_env_recreates_environment() {
        let dir = pipenv_dir();
        let runner = MockRunner::new().with_response("pipenv --rm", 1, "");
        Python::new(&runner, dir.path())
            .without_tool_check()
            .with_interpreter("python3.8")
            .install_build_env()
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "pipenv --rm",
                "pipenv install --dev --python=python3.8 --skip-lock",
                "pipenv graph",
            ]
        );
    }

    #[test]
    fn test_code_checks_run_through_pipenv() {
        let dir = pipenv_dir();
        let runner = MockRunner::new();
        let checks = CodeChecks {
            isort: false,
            pydocstyle: false,
            flake8: false,
            safety: false,
            ..CodeChecks::default()
        };
        Python::new(&runner, dir.path())
            .without_tool_check()
            .code_checks(&checks)
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "pipenv --venv",
                "pipenv run black --check src",
                "pipenv run black --check tests",
                "pipenv run mypy src",
            ]
        );
    }

    #[test]
    fn test_code_checks_stop_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new().with_response("black --check src", 1, "");
        let result = Python::new(&runner, dir.path())
            .without_tool_check()
            .code_checks(&CodeChecks::default());
        assert!(result.is_err());
        assert_eq!(runner.commands(), vec!["black --check src"]);
    }

    #[test]
    fn test_slow_tests_only_with_marker() {
        let runner = MockRunner::new();
        let python = Python::new(&runner, ".").without_tool_check();

        python.run_tests(&sanitized(&["--test"])).unwrap();
        python
            .run_tests(&sanitized(&["--test", "--test-marker=slow"]))
            .unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "pipenv run coverage erase",
                "pipenv run pytest -m 'not slow'",
                "pipenv run coverage erase",
                "pipenv run pytest",
            ]
        );
    }

    #[test]
    fn test_py_version_environment_is_removed_after_failure() {
        let dir = pipenv_dir();
        let runner = MockRunner::new().with_response("pipenv run pytest", 1, "");
        let result = Python::new(&runner, dir.path())
            .without_tool_check()
            .test_with_py_version("3.7.9");
        assert!(result.is_err());

        let commands = runner.commands();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[3], "pipenv --rm");
        assert_eq!(commands[4], "pyenv local --unset && pyenv uninstall -f 3.7.9");
    }

    #[test]
    fn test_py_version_without_pipfile_is_skipped() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        Python::new(&runner, dir.path())
            .without_tool_check()
            .test_with_py_version("3.7.9")
            .unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_update_version_writes_pip_compatible_string() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("_about.py");
        fs::write(&module, "__version__ = \"0.0.0\"\n").unwrap();

        let runner = MockRunner::new();
        let version = Version::new(1, 2, 0).with_suffix("dev.foo");
        Python::new(&runner, dir.path())
            .update_version("_about.py", &version)
            .unwrap();

        assert_eq!(
            fs::read_to_string(&module).unwrap(),
            "__version__ = \"1.2.0.dev1+foo\"\n"
        );
    }

    #[test]
    fn test_update_version_of_missing_module_fails() {
        let dir = TempDir::new().unwrap();
        let runner = MockRunner::new();
        let result = Python::new(&runner, dir.path())
            .update_version("missing.py", &Version::new(1, 0, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_build_distribution_removes_stale_builds() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist").join("old.whl"), "").unwrap();

        let runner = MockRunner::new();
        Python::new(&runner, dir.path())
            .without_tool_check()
            .build_distribution()
            .unwrap();

        assert!(!dir.path().join("dist").exists());
        assert_eq!(
            runner.commands(),
            vec![
                "python setup.py sdist bdist_wheel clean --all",
                "twine check dist/*",
            ]
        );
    }

    #[test]
    fn test_publish_requires_token() {
        let runner = MockRunner::new();
        let err = Python::new(&runner, ".")
            .without_tool_check()
            .publish_pypi_distribution("", DEFAULT_PYPI_USER, None)
            .unwrap_err();
        assert!(err.to_string().contains("--pypi-token"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_publish_to_custom_repository() {
        let runner = MockRunner::new();
        Python::new(&runner, ".")
            .without_tool_check()
            .publish_pypi_distribution("pypi-abc", DEFAULT_PYPI_USER, Some("https://test.pypi.org/legacy/"))
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec!["twine upload --non-interactive -u __token__ -p pypi-abc --repository-url https://test.pypi.org/legacy/ dist/*"]
        );
    }
}
