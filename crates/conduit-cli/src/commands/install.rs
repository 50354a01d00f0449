//! The install command

use std::collections::BTreeMap;

use colored::Colorize;
use conduit_components::config::DEFAULT_VERSION_CONSTRAINT;
use conduit_components::{ComponentDefinition, Error};

use super::verify::print_checks;
use crate::context::{Context, block_on};
use crate::error::{CliError, Result};

/// Flags of `conduit install`.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub force: bool,
    pub package: Option<String>,
    pub constraint: Option<String>,
    pub timeout: Option<u64>,
}

/// Run the install command
pub fn run_install(ctx: &Context, name: &str, options: InstallOptions) -> Result<()> {
    let definition = resolve_definition(ctx, name, &options)?;
    let service = ctx.service(options.timeout)?;

    if !options.force {
        if let Some(existing) = service.manager().get(name)? {
            println!(
                "{} {} is already installed ({} {})",
                "✓".green(),
                name.bold(),
                existing.package_id,
                existing.version_constraint.dimmed()
            );
            println!(
                "Use {} to reinstall or {} to check it.",
                format!("conduit install {name} --force").cyan(),
                format!("conduit verify {name}").cyan()
            );
            return Ok(());
        }
    }

    println!(
        "{} {} ({} {})",
        "Installing".green().bold(),
        name.bold(),
        definition.package,
        definition.version.dimmed()
    );
    let report = block_on(service.install(&definition.request(name)))?;

    let diverged = report.is_diverged();
    if let Some(failure) = report.failure {
        if diverged {
            eprintln!(
                "{} {} is installed but was not registered.",
                "warning:".yellow().bold(),
                report.package_id
            );
            eprintln!(
                "  Retry with {} or remove it with {}.",
                format!("conduit install {name} --force").cyan(),
                format!("composer remove {}", report.package_id).cyan()
            );
        }
        return Err(CliError::user(format!(
            "{} stage failed: {}",
            failure.stage, failure.error
        )));
    }

    if let Some(component) = &report.component {
        println!(
            "{} Registered {} with {} entry point(s)",
            "✓".green(),
            component.name.bold(),
            component.entry_points.len()
        );
        for entry_point in &component.entry_points {
            println!("  {} {}", "→".dimmed(), entry_point);
        }
    }

    if let Some(verification) = &report.verification {
        print_checks(verification);
        if !verification.passed() {
            println!(
                "{} {} is registered but failed verification. Run {} after fixing it.",
                "warning:".yellow().bold(),
                name,
                format!("conduit verify {name}").cyan()
            );
        }
    }

    Ok(())
}

/// Configured or built-in definition with command-line overrides applied.
///
/// `--package` makes any name installable without configuration.
fn resolve_definition(
    ctx: &Context,
    name: &str,
    options: &InstallOptions,
) -> Result<ComponentDefinition> {
    let mut definition = match ctx.config.component(name) {
        Ok(definition) => definition,
        Err(Error::UnknownComponent(_)) if options.package.is_some() => ComponentDefinition {
            package: String::new(),
            version: DEFAULT_VERSION_CONSTRAINT.to_string(),
            commands: Vec::new(),
            fields: BTreeMap::new(),
        },
        Err(Error::UnknownComponent(_)) => {
            return Err(CliError::user(format!(
                "unknown component '{name}'; configure it in conduit.toml or pass --package"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(package) = &options.package {
        definition.package = package.clone();
    }
    if let Some(constraint) = &options.constraint {
        definition.version = constraint.clone();
    }
    Ok(definition)
}
