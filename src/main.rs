use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use universal_build::args::{FlagSpec, Schema};
use universal_build::cli::orchestration::run_build_workflow;
use universal_build::config::{self, BuildConfig};
use universal_build::exit::{exit_with, ExitCode};
use universal_build::git::Git2TagSource;
use universal_build::runner::ShellRunner;
use universal_build::sanitizer::{env_override, Sanitizer};
use universal_build::ui;

const FLAG_CONFIG: &str = "config";

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

fn schema() -> Schema {
    Schema::base().extend([FlagSpec::value(
        FLAG_CONFIG,
        "Custom configuration file path",
    )])
}

/// Config path from `--config`, `CONFIG` or `INPUT_CONFIG`
fn config_path(schema: &Schema, tokens: &[String]) -> Option<String> {
    let from_command_line = schema
        .parse(tokens)
        .ok()
        .and_then(|parsed| parsed.args.value(FLAG_CONFIG).map(str::to_string));

    from_command_line.or_else(|| schema.get(FLAG_CONFIG).and_then(env_override))
}

fn load_config(path: Option<&str>) -> BuildConfig {
    match config::load_config(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            exit_with(ExitCode::General);
        }
    }
}

fn main() -> Result<()> {
    init_logging();

    let tokens: Vec<String> = std::env::args().skip(1).collect();
    let schema = schema();
    let config = load_config(config_path(&schema, &tokens).as_deref());

    let source = Git2TagSource::open(".", config.versioning.remote.clone())
        .context("universal-build must run inside a git repository")?;
    let runner = ShellRunner::new();

    let args = Sanitizer::new(&source)
        .with_schema(schema)
        .with_policy(config.release_policy())
        .sanitize_or_exit(&tokens);

    if config.components.is_empty() {
        ui::display_status("No components configured, nothing to build");
        return Ok(());
    }

    ui::display_build_plan(&config.components, &args);

    match run_build_workflow(&args, &config, &source, &runner) {
        Ok(result) => {
            for (component, outcome) in &result.outcomes {
                ui::display_outcome(component, outcome);
            }
            if let Some(tag) = &result.tag {
                ui::display_success(&format!("Tagged version {} as {}", result.version, tag));
            }
            ui::display_success(&format!("Build {} finished", result.version));
            Ok(())
        }
        Err(e) => {
            ui::display_error(&e.to_string());
            exit_with(e.exit_code());
        }
    }
}
