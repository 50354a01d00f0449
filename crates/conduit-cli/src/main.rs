//! Conduit CLI
//!
//! Installs, lists, verifies and removes framework components.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use context::Context;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CliError::user(format!("failed to set tracing subscriber: {e}")))?;
        tracing::debug!("Verbose mode enabled");
    }

    let Some(command) = cli.command else {
        println!("{} component manager", "conduit".green().bold());
        println!();
        println!("Run {} for available commands.", "conduit --help".cyan());
        return Ok(());
    };

    let ctx = Context::load(cli.config.as_deref(), cli.registry)?;
    execute_command(&ctx, command)
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Install {
            name,
            force,
            package,
            constraint,
            timeout,
        } => commands::run_install(
            ctx,
            &name,
            commands::InstallOptions {
                force,
                package,
                constraint,
                timeout,
            },
        ),
        Commands::Remove { name } => commands::run_remove(ctx, &name),
        Commands::List { json } => commands::run_list(ctx, json),
        Commands::Verify { name } => commands::run_verify(ctx, &name),
    }
}
