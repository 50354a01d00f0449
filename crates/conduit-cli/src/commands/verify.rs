//! The verify command

use colored::Colorize;
use conduit_components::Verification;

use crate::context::{Context, block_on};
use crate::error::{CliError, Result};

/// Run the verify command
pub fn run_verify(ctx: &Context, name: &str) -> Result<()> {
    let expected_commands = ctx
        .config
        .component(name)
        .map(|definition| definition.commands)
        .unwrap_or_default();

    let service = ctx.service(None)?;
    let verification = block_on(service.verify(name, &expected_commands))??;
    print_checks(&verification);

    if verification.passed() {
        println!("{} {} is healthy", "✓".green(), name.bold());
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} of {} check(s) failed for '{name}'",
            verification.failures().count(),
            verification.checks.len()
        )))
    }
}

/// One line per check.
pub fn print_checks(verification: &Verification) {
    for check in &verification.checks {
        let mark = if check.passed {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {:<20} {}", mark, check.name, check.detail.dimmed());
    }
}
