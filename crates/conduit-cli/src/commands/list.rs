//! The list command

use colored::Colorize;

use crate::context::Context;
use crate::error::Result;

/// Run the list command
pub fn run_list(ctx: &Context, json: bool) -> Result<()> {
    let components = ctx.manager()?.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&components)?);
        return Ok(());
    }

    if components.is_empty() {
        println!("No components registered.");
        println!("Run {} to add one.", "conduit install <name>".cyan());
        return Ok(());
    }

    println!("{}", "Registered Components".bold());
    println!();
    for component in &components {
        println!(
            "  {:<16} {} {} ({} entry point(s), installed {})",
            component.name.green(),
            component.package_id,
            component.version_constraint.dimmed(),
            component.entry_points.len(),
            component.installed_at.format("%Y-%m-%d")
        );
    }
    println!();
    println!("{} {} component(s)", "Total:".dimmed(), components.len());
    Ok(())
}
