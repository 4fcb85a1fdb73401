//! podalert - pod-driven Prometheus CPU alert rule generator
//!
//! Reads pod watch events and maintains one CPU usage alert rule per
//! container in a Prometheus rule file.

use clap::Parser;
use podalert::cli::args::{generate_completions, Cli, Commands};
use podalert::commands::{run_daemon, run_render};
use podalert::config::ConfigBuilder;
use podalert::error::{AppError, CheckError, MaterializeError};

fn main() {
    let cli = Cli::parse();

    // Initialize logging from -v or [general] verbose; RUST_LOG still takes
    // precedence
    let settings = ConfigBuilder::new()
        .with_file(cli.config.as_deref())
        .with_verbose(cli.verbose.then_some(true))
        .build()
        .unwrap_or_default();
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_filter()),
    );
    if !matches!(cli.command, Commands::Run(_)) {
        logger.format_timestamp(None);
    }
    logger.init();

    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Run(args) => run_daemon(args, config, cli.dry_run, cli.verbose),

        Commands::Render(args) => run_render(args, config),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Materialize(MaterializeError::Rejected {
            source: CheckError::Spawn { command, .. },
            ..
        }) => {
            eprintln!();
            eprintln!("Hint: '{}' could not be started.", command);
            eprintln!("      Install promtool or run with --no-check.");
        }
        AppError::Materialize(MaterializeError::Rejected { .. }) => {
            eprintln!();
            eprintln!("Hint: The live rule file was left unchanged.");
            eprintln!("      Use 'podalert render' to inspect the rules the events produce.");
        }
        _ => {}
    }
}
