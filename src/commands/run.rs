//! Run command implementation
//!
//! Starts the materializer engine, feeds it pod watch events and supervises
//! it until the event stream ends, a shutdown signal arrives or a pass fails.

use crate::batch::PendingBatch;
use crate::cli::args::RunArgs;
use crate::config::{Config, ConfigBuilder};
use crate::error::{EventError, Result};
use crate::events::{forward_events, StreamStats};
use crate::propagation::{ConfigMapPropagator, PropagationManager, ReloadPropagator};
use crate::services::{
    AtomicPublisher, Engine, Materializer, NoopChecker, PromtoolChecker, RuleChecker,
};

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::thread;

/// Execute the run command
pub fn run_daemon(
    args: &RunArgs,
    config_path: Option<&str>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let config = load_config(args, config_path, dry_run, verbose)?;

    // Open the event source before touching the rule file
    let reader: Box<dyn Read + Send> = match &args.events {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let checker: Box<dyn RuleChecker> = if config.checker.enabled {
        Box::new(PromtoolChecker::new(config.checker.command.as_str()))
    } else {
        log::warn!("Rule checking disabled, candidates are published unchecked");
        Box::new(NoopChecker)
    };
    let materializer = Materializer::new(
        AtomicPublisher::new(config.rules_path()),
        checker,
        config.template.clone(),
    );
    let propagation = build_sinks(&config)?;

    log::info!("Starting rule generator");
    log::info!("  Rule file: {}", config.rules_path().display());
    let checker_name = if config.checker.enabled {
        config.checker.command.as_str()
    } else {
        "none"
    };
    log::info!("  Checker: {}", checker_name);
    log::info!("  Dry run: {}", config.general.dry_run);

    let engine = Engine::new(config.trigger_config(), materializer, propagation).spawn();

    let batch = engine.batch();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        batch.close();
    })?;

    let batch = engine.batch();
    let producer = thread::Builder::new()
        .name("events".to_string())
        .spawn(move || produce(reader, &batch))?;

    // A fatal pass error ends the engine while the producer may still be
    // blocked on input, so only the engine is joined unconditionally.
    let stats = engine.join()?;
    log::info!(
        "Engine finished: {} passes, {} published, {} entities, {} propagation failures",
        stats.passes,
        stats.published,
        stats.entities,
        stats.propagation_failures
    );

    if producer.is_finished() {
        match producer.join() {
            Ok(result) => {
                result?;
            }
            Err(_) => log::error!("Event reader thread panicked"),
        }
    }

    Ok(())
}

/// Forward events until end of stream, then close the batch
fn produce(
    reader: Box<dyn Read + Send>,
    batch: &PendingBatch,
) -> std::result::Result<StreamStats, EventError> {
    let result = forward_events(reader, batch);
    match &result {
        Ok(stats) => log::info!(
            "Event stream ended: {} events, {} entities, {} malformed",
            stats.events,
            stats.entities,
            stats.malformed
        ),
        Err(e) => log::error!("Event stream failed: {}", e),
    }
    batch.close();
    result
}

fn load_config(
    args: &RunArgs,
    config_path: Option<&str>,
    dry_run: bool,
    verbose: bool,
) -> Result<Config> {
    let config = ConfigBuilder::new()
        .with_file(config_path)
        .with_verbose(verbose.then_some(true))
        .with_dry_run(dry_run.then_some(true))
        .with_rules_dir(args.rules_dir.clone())
        .with_prometheus_url(args.prometheus_url.clone())
        .with_max_pending(args.max_pending.map(|m| usize::try_from(m).unwrap_or(usize::MAX)))
        .with_max_wait(args.max_wait)
        .with_namespace(args.namespace.clone())
        .without_checker(args.no_check)
        .without_configmap(args.no_configmap)
        .without_reload(args.no_reload)
        .build()?;
    Ok(config)
}

/// Build the propagation sinks in the order they must run
///
/// The ConfigMap is updated before Prometheus is asked to reload.
fn build_sinks(config: &Config) -> Result<PropagationManager> {
    let mut manager = PropagationManager::new();
    let timeout = config.http_timeout();

    if config.general.dry_run {
        if config.configmap.enabled {
            log::info!(
                "[DRY RUN] Would mirror rules into ConfigMap {}",
                config.configmap.name
            );
        }
        if config.prometheus.reload {
            log::info!(
                "[DRY RUN] Would reload Prometheus at {}",
                config.prometheus.url
            );
        }
        return Ok(manager);
    }

    // Without a namespace or readable credentials the ConfigMap is skipped;
    // the rule file and the reload still work
    if config.configmap.enabled {
        match ConfigMapPropagator::from_config(&config.configmap, &config.rules.file_name, timeout)
        {
            Ok(sink) => manager.add_sink(Box::new(sink)),
            Err(e) => log::warn!("ConfigMap sink disabled: {}", e),
        }
    }
    if config.prometheus.reload {
        manager.add_sink(Box::new(ReloadPropagator::new(&config.prometheus.url, timeout)?));
    }

    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::error::AppError;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn run_args(argv: &[&str]) -> RunArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("Expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_overrides_reach_config() {
        let args = run_args(&[
            "podalert",
            "run",
            "--rules-dir",
            "/tmp/rules",
            "--max-pending",
            "5",
            "--max-wait",
            "7",
            "--namespace",
            "monitoring",
            "--no-check",
        ]);
        let config = load_config(&args, Some("/nonexistent/podalert.toml"), true, false).unwrap();

        assert_eq!(config.rules.dir, std::path::PathBuf::from("/tmp/rules"));
        assert_eq!(config.batch.max_pending, 5);
        assert_eq!(config.batch.max_wait_seconds, 7);
        assert_eq!(config.configmap.namespace.as_deref(), Some("monitoring"));
        assert!(!config.checker.enabled);
        assert!(config.general.dry_run);
    }

    #[test]
    fn test_dry_run_installs_no_sinks() {
        let mut config = Config::default();
        config.general.dry_run = true;
        assert_eq!(build_sinks(&config).unwrap().sink_count(), 0);
    }

    #[test]
    fn test_default_sinks_start_outside_cluster() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.configmap.namespace_path = dir.path().join("namespace");

        let manager = build_sinks(&config).unwrap();
        assert_eq!(manager.sink_count(), 1);

        fs::write(&config.configmap.namespace_path, "monitoring\n").unwrap();
        config.configmap.token_path = dir.path().join("token");
        config.configmap.ca_path = dir.path().join("ca.crt");
        assert_eq!(build_sinks(&config).unwrap().sink_count(), 2);
    }

    #[test]
    fn test_sinks_follow_config() {
        let mut config = Config::default();
        config.configmap.enabled = false;
        assert_eq!(build_sinks(&config).unwrap().sink_count(), 1);

        config.prometheus.reload = false;
        assert_eq!(build_sinks(&config).unwrap().sink_count(), 0);
    }

    #[test]
    fn test_produce_closes_batch_at_end_of_stream() {
        let batch = PendingBatch::new(Default::default());
        let input = r#"{"type": "DELETED", "object": {"metadata": {"name": "p", "namespace": "n"}}}"#;

        let stats = produce(Box::new(input.as_bytes()), &batch).unwrap();
        assert_eq!(stats.entities, 1);
        assert!(batch.is_closed());
    }

    #[test]
    fn test_missing_events_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("events.json");
        let args = run_args(&[
            "podalert",
            "run",
            "--events",
            missing.to_str().unwrap(),
            "--rules-dir",
            dir.path().to_str().unwrap(),
        ]);

        let result = run_daemon(&args, Some("/nonexistent/podalert.toml"), true, false);
        assert!(matches!(result, Err(AppError::Io(_))));
        assert!(!dir.path().join("instance_cpu_alert_rules.yml").exists());
    }
}
