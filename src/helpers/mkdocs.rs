use crate::error::{BuildError, Result};
use crate::helpers::python::Python;
use crate::runner::{require_command, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const MARKDOWN_LINT_CONFIG: &str = ".markdown-lint.yml";

/// Port of the mkdocs development server
pub const DEFAULT_DEV_PORT: u16 = 8001;

const GH_DEPLOY_TIMEOUT: Duration = Duration::from_secs(120);

/// MkDocs documentation build steps for the component in `dir`
pub struct MkDocs<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
    interpreter: String,
    require_tools: bool,
}

impl<'a> MkDocs<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl AsRef<Path>) -> Self {
        MkDocs {
            runner,
            dir: dir.as_ref().to_path_buf(),
            interpreter: "python".to_string(),
            require_tools: true,
        }
    }

    /// Interpreter used for the pipenv environment
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Do not check the `PATH` for pipenv, mkdocs or markdownlint before running them
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

    fn python(&self) -> Python<'a> {
        let python = Python::new(self.runner, &self.dir);
        if self.require_tools {
            python
        } else {
            python.without_tool_check()
        }
    }

    fn run(&self, spec: CommandSpec) -> Result<()> {
        self.runner
            .run(&spec.in_dir(&self.dir).exit_on_error(false))?
            .into_result()
            .map(|_| ())
    }

    /// `mkdocs <args>`, through `pipenv run` inside a pipenv environment
    fn mkdocs_command(&self, args: &str) -> Result<String> {
        if self.python().is_pipenv_environment() {
            Ok(format!("pipenv run mkdocs {}", args))
        } else {
            self.tool_available("mkdocs")?;
            Ok(format!("mkdocs {}", args))
        }
    }

    /// Recreate the pipenv environment; site packages stay visible for mkdocs plugins
    pub fn install_build_env(&self) -> Result<()> {
        self.tool_available("pipenv")?;
        if !self.dir.join("Pipfile").is_file() {
            return Err(BuildError::config(format!(
                "No Pipfile discovered in {}, cannot install pipenv environment",
                self.dir.display()
            )));
        }

        // A missing environment is fine
        let _ = self.run(CommandSpec::new("pipenv --rm"));
        self.run(CommandSpec::new(format!(
            "pipenv install --dev --python={} --skip-lock --site-packages",
            self.interpreter
        )))
    }

    /// Lint `./docs` with markdownlint, using `.markdown-lint.yml` when present
    pub fn lint_markdown(&self) -> Result<()> {
        info!("Run linters and style checks:");
        self.tool_available("markdownlint")?;

        let command = if self.dir.join(MARKDOWN_LINT_CONFIG).exists() {
            format!("markdownlint --config={} ./docs", MARKDOWN_LINT_CONFIG)
        } else {
            "markdownlint ./docs".to_string()
        };
        self.run(CommandSpec::new(command))
    }

    pub fn build_mkdocs(&self) -> Result<()> {
        self.run(CommandSpec::new(self.mkdocs_command("build")?))
    }

    /// Publish the documentation to GitHub pages
    pub fn deploy_gh_pages(&self) -> Result<()> {
        info!("Deploy documentation to Github pages:");
        let command = self.mkdocs_command("gh-deploy --clean")?;
        self.run(CommandSpec::new(command).timeout(GH_DEPLOY_TIMEOUT))
    }

    /// Serve the documentation on all interfaces until the server stops
    pub fn run_dev_mode(&self, port: u16) -> Result<()> {
        info!("Run docs in development mode (http://localhost:{}):", port);
        let command = self.mkdocs_command(&format!("serve --dev-addr 0.0.0.0:{}", port))?;
        self.run(CommandSpec::new(command))
    }
}
