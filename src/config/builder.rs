//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;

use std::path::PathBuf;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file, or from the default locations
    ///
    /// An unreadable file falls back to the defaults with a warning.
    pub fn with_file(mut self, path: Option<&str>) -> Self {
        let file_config = if let Some(path) = path {
            match ConfigFile::load(path) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    log::warn!("Using built-in defaults: {}", e);
                    None
                }
            }
        } else {
            ConfigFile::load_default()
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        self
    }

    /// Override with CLI verbose flag
    pub fn with_verbose(mut self, verbose: Option<bool>) -> Self {
        if let Some(v) = verbose {
            self.config.general.verbose = v;
        }
        self
    }

    /// Override with CLI dry-run flag
    pub fn with_dry_run(mut self, dry_run: Option<bool>) -> Self {
        if let Some(d) = dry_run {
            self.config.general.dry_run = d;
        }
        self
    }

    /// Override the rule file directory
    pub fn with_rules_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(d) = dir {
            self.config.rules.dir = d;
        }
        self
    }

    /// Override the Prometheus base URL
    pub fn with_prometheus_url(mut self, url: Option<String>) -> Self {
        if let Some(u) = url {
            self.config.prometheus.url = u;
        }
        self
    }

    /// Override the batch size threshold
    pub fn with_max_pending(mut self, max_pending: Option<usize>) -> Self {
        if let Some(m) = max_pending {
            self.config.batch.max_pending = m;
        }
        self
    }

    /// Override the debounce window in seconds
    pub fn with_max_wait(mut self, seconds: Option<u64>) -> Self {
        if let Some(s) = seconds {
            self.config.batch.max_wait_seconds = s;
        }
        self
    }

    /// Override the ConfigMap namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        if let Some(ns) = namespace {
            self.config.configmap.namespace = Some(ns);
        }
        self
    }

    /// Disable promtool checking
    pub fn without_checker(mut self, disable: bool) -> Self {
        if disable {
            self.config.checker.enabled = false;
        }
        self
    }

    /// Disable ConfigMap propagation
    pub fn without_configmap(mut self, disable: bool) -> Self {
        if disable {
            self.config.configmap.enabled = false;
        }
        self
    }

    /// Disable the Prometheus reload request
    pub fn without_reload(mut self, disable: bool) -> Self {
        if disable {
            self.config.prometheus.reload = false;
        }
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
