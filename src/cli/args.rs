//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::batch::MAX_WAIT_SECONDS;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Pod-driven Prometheus CPU alert rule generator
///
/// Keeps one CPU usage alert rule per container in a Prometheus rule file,
/// driven by pod watch events.
#[derive(Parser, Debug)]
#[command(name = "podalert")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "PODALERT_CONFIG")]
    pub config: Option<String>,

    /// Dry run mode - write the rule file but don't propagate it
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the rule generator daemon
    Run(RunArgs),

    /// Print the rule file a stream of events would produce
    Render(RenderArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Read watch events from a file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Directory holding the rule file
    #[arg(long, env = "RULES_DIR")]
    pub rules_dir: Option<PathBuf>,

    /// Prometheus base URL
    #[arg(long, env = "PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,

    /// Flush as soon as this many entities are pending
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_pending: Option<u64>,

    /// Flush at most this many seconds after the previous pass
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_WAIT_SECONDS)
    )]
    pub max_wait: Option<u64>,

    /// Namespace of the rules ConfigMap
    #[arg(long)]
    pub namespace: Option<String>,

    /// Skip promtool validation
    #[arg(long)]
    pub no_check: bool,

    /// Don't mirror the rule file into a ConfigMap
    #[arg(long)]
    pub no_configmap: bool,

    /// Don't ask Prometheus to reload
    #[arg(long)]
    pub no_reload: bool,
}

/// Arguments for the render command
#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Read watch events from a file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// What to print
    #[arg(long, value_enum, default_value = "rules")]
    pub output: RenderOutput,
}

/// Render output
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderOutput {
    /// The full rule file
    #[default]
    Rules,
    /// One rule identity per line
    Keys,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let args = Cli::try_parse_from(["podalert", "run"]).unwrap();
        assert!(matches!(args.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let args = Cli::try_parse_from(["podalert", "-v", "run"]).unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let args = Cli::try_parse_from(["podalert", "run", "--dry-run", "-c", "a.toml"]).unwrap();
        assert!(args.dry_run);
        assert_eq!(args.config.as_deref(), Some("a.toml"));
    }

    #[test]
    fn test_cli_parse_run_args() {
        let args = Cli::try_parse_from([
            "podalert",
            "run",
            "--events",
            "events.json",
            "--rules-dir",
            "/tmp/rules",
            "--max-pending",
            "10",
            "--max-wait",
            "30",
            "--no-check",
            "--no-reload",
        ])
        .unwrap();

        if let Commands::Run(run) = args.command {
            assert_eq!(run.events, Some(PathBuf::from("events.json")));
            assert_eq!(run.rules_dir, Some(PathBuf::from("/tmp/rules")));
            assert_eq!(run.max_pending, Some(10));
            assert_eq!(run.max_wait, Some(30));
            assert!(run.no_check);
            assert!(!run.no_configmap);
            assert!(run.no_reload);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_max_pending_validation() {
        let result = Cli::try_parse_from(["podalert", "run", "--max-pending", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_max_wait_bounded() {
        let result = Cli::try_parse_from(["podalert", "run", "--max-wait", "18446744073709551615"]);
        assert!(result.is_err());

        let args = Cli::try_parse_from(["podalert", "run", "--max-wait", "31536000"]).unwrap();
        assert!(matches!(args.command, Commands::Run(run) if run.max_wait == Some(MAX_WAIT_SECONDS)));
    }

    #[test]
    fn test_cli_parse_render_keys() {
        let args = Cli::try_parse_from(["podalert", "render", "--output", "keys"]).unwrap();
        if let Commands::Render(render) = args.command {
            assert_eq!(render.output, RenderOutput::Keys);
            assert!(render.events.is_none());
        } else {
            panic!("Expected Render command");
        }
    }
}
