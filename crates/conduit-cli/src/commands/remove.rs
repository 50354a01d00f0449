//! The remove command

use colored::Colorize;

use crate::context::Context;
use crate::error::Result;

/// Run the remove command
///
/// Only the registry entry is removed; uninstalling the package is left
/// to the package manager.
pub fn run_remove(ctx: &Context, name: &str) -> Result<()> {
    match ctx.manager()?.unregister(name)? {
        Some(component) => {
            println!("{} Removed {} from the registry", "✓".green(), name.bold());
            println!(
                "  The package is still installed; run {} to delete it.",
                format!("composer remove {}", component.package_id).cyan()
            );
        }
        None => {
            println!("{} is not registered; nothing to remove.", name.bold());
        }
    }
    Ok(())
}
