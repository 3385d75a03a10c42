//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Skiff - OCI image push tool
///
/// Pushes a locally unpacked container filesystem image to an
/// OCI/Docker-v2-compliant registry.
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SKIFF_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push an unpacked image to a registry
    Push(PushArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the push command
#[derive(Parser, Debug)]
pub struct PushArgs {
    /// Source image reference
    pub source: String,

    /// Destination reference (defaults to the source reference)
    pub dest: Option<String>,

    /// Unpacked image directory (defaults to the storage location
    /// derived from the source reference)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Reuse prepared manifest, config, and layers across pushes
    #[arg(long)]
    pub cache: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Action to perform
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommand actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn push_defaults() {
        let cli = Cli::parse_from(["skiff", "push", "alpine:3.19"]);
        let Commands::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(args.source, "alpine:3.19");
        assert!(args.dest.is_none());
        assert!(!args.cache);
        assert!(args.image.is_none());
    }

    #[test]
    fn push_with_destination_and_flags() {
        let cli = Cli::parse_from([
            "skiff",
            "push",
            "alpine:3.19",
            "ghcr.io/org/alpine:3.19",
            "--cache",
            "--image",
            "/tmp/img",
        ]);
        let Commands::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(args.dest.as_deref(), Some("ghcr.io/org/alpine:3.19"));
        assert!(args.cache);
        assert_eq!(args.image, Some(PathBuf::from("/tmp/img")));
    }
}
