use crate::boundary::BuildWarning;
use crate::dispatcher::BuildOutcome;
use crate::sanitizer::SanitizedArgs;
use console::style;

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

pub fn display_warning(warning: &BuildWarning) {
    eprintln!("{} {}", style("WARNING:").yellow().bold(), warning);
}

/// Summarize the steps and version of a build before it starts
pub fn display_build_plan(components: &[String], args: &SanitizedArgs) {
    let steps: Vec<&str> = [
        ("make", args.make()),
        ("check", args.check()),
        ("test", args.test()),
        ("release", args.release()),
        ("run", args.run()),
    ]
    .into_iter()
    .filter(|(_, enabled)| *enabled)
    .map(|(name, _)| name)
    .collect();

    println!("\n{}", style("Build plan:").bold());
    println!(
        "  Version:    {}",
        style(args.version().unwrap_or("-")).green()
    );
    println!(
        "  Steps:      {}",
        if steps.is_empty() {
            "-".to_string()
        } else {
            steps.join(", ")
        }
    );
    if args.force() {
        println!("  Force:      {}", style("yes").red());
    }
    println!("  Components:");
    for component in components {
        println!("    - {}", component);
    }
    println!();
}

pub fn display_outcome(component: &str, outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::Built => display_success(&format!("Built {}", component)),
        BuildOutcome::Skipped { skip_path } => display_warning(&BuildWarning::ComponentSkipped {
            path: component.to_string(),
            skip_path: skip_path.clone(),
        }),
    }
}
