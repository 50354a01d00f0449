//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Conduit - install and manage framework components
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./conduit.toml when present)
    #[arg(long, global = true, env = "CONDUIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Component registry file
    #[arg(long, global = true, env = "CONDUIT_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install a component and register its service providers
    ///
    /// Examples:
    ///   conduit install github
    ///   conduit install demo --package vendor/demo --constraint "^1.0"
    Install {
        /// Component name
        name: String,

        /// Reinstall even if the component is already registered
        #[arg(long)]
        force: bool,

        /// Package identifier (vendor/name), overriding the configured one
        #[arg(long)]
        package: Option<String>,

        /// Version constraint, overriding the configured one
        #[arg(long)]
        constraint: Option<String>,

        /// Package manager timeout in seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
    },

    /// Unregister a component (the package itself stays installed)
    Remove {
        /// Component name
        name: String,
    },

    /// List registered components
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Re-run health checks for a registered component
    Verify {
        /// Component name
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_install_with_overrides() {
        let cli = Cli::parse_from([
            "conduit",
            "install",
            "demo",
            "--force",
            "--package",
            "vendor/demo",
            "--constraint",
            "^2.0",
            "--timeout",
            "60",
        ]);
        assert_eq!(
            cli.command,
            Some(Commands::Install {
                name: "demo".to_string(),
                force: true,
                package: Some("vendor/demo".to_string()),
                constraint: Some("^2.0".to_string()),
                timeout: Some(60),
            })
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["conduit", "list", "--json", "--registry", "/tmp/r.json", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.registry, Some(PathBuf::from("/tmp/r.json")));
        assert_eq!(cli.command, Some(Commands::List { json: true }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Cli::try_parse_from(["conduit", "install", "demo", "--timeout", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn verify_requires_name() {
        assert!(Cli::try_parse_from(["conduit", "verify"]).is_err());
    }
}
