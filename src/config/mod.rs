//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging. Every value has
//! a built-in default, so a missing file or setting is never fatal.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::batch::{TriggerConfig, MAX_WAIT_SECONDS};
use crate::error::ConfigError;
use crate::rules::RuleTemplate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service account mount inside a pod
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Rule file location
    pub rules: RulesConfig,
    /// Rule expression template
    pub template: RuleTemplate,
    /// Debounce thresholds
    pub batch: BatchConfig,
    /// Candidate checking
    pub checker: CheckerConfig,
    /// Prometheus reload notification
    pub prometheus: PrometheusConfig,
    /// ConfigMap propagation
    pub configmap: ConfigMapConfig,
}

impl Config {
    /// Full path of the live rule file
    pub fn rules_path(&self) -> PathBuf {
        self.rules.dir.join(&self.rules.file_name)
    }

    /// Debounce thresholds for the pending batch
    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            max_pending: self.batch.max_pending,
            max_wait: Duration::from_secs(self.batch.max_wait_seconds),
        }
    }

    /// Timeout applied to every propagation request
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.general.http_timeout_seconds)
    }

    /// Default log filter for this configuration
    pub fn log_filter(&self) -> &'static str {
        if self.general.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.batch.max_pending == 0 {
            return Err(invalid("batch.max_pending", "must be at least 1"));
        }
        if self.batch.max_wait_seconds == 0 {
            return Err(invalid("batch.max_wait_seconds", "must be at least 1"));
        }
        if self.batch.max_wait_seconds > MAX_WAIT_SECONDS {
            return Err(invalid("batch.max_wait_seconds", "must be at most one year"));
        }
        if self.rules.file_name.is_empty() || self.rules.file_name.contains('/') {
            return Err(invalid("rules.file_name", "must be a plain file name"));
        }
        if !(self.template.usage_ratio > 0.0 && self.template.usage_ratio.is_finite()) {
            return Err(invalid("template.usage_ratio", "must be a positive number"));
        }
        if self.checker.enabled && self.checker.command.is_empty() {
            return Err(invalid("checker.command", "must not be empty"));
        }
        Ok(())
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,
    /// Dry run mode (no propagation)
    pub dry_run: bool,
    /// Timeout for HTTP requests to Prometheus and the API server
    pub http_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            dry_run: false,
            http_timeout_seconds: 10,
        }
    }
}

/// Rule file location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory holding the rule file
    pub dir: PathBuf,
    /// Rule file name, also the ConfigMap data key
    pub file_name: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/mnt"),
            file_name: "instance_cpu_alert_rules.yml".to_string(),
        }
    }
}

/// Debounce thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pending entities that force an immediate pass
    pub max_pending: usize,
    /// Longest wait between passes in seconds
    pub max_wait_seconds: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_pending: 60,
            max_wait_seconds: 300,
        }
    }
}

/// Candidate checking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Run promtool on every candidate
    pub enabled: bool,
    /// promtool binary
    pub command: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "promtool".to_string(),
        }
    }
}

/// Prometheus reload notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Prometheus base URL
    pub url: String,
    /// POST /-/reload after each publication
    pub reload: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: "http://prometheus:9090".to_string(),
            reload: true,
        }
    }
}

/// ConfigMap propagation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMapConfig {
    /// Store each publication in a ConfigMap
    pub enabled: bool,
    /// ConfigMap name
    pub name: String,
    /// Target namespace; defaults to the namespace the controller runs in
    pub namespace: Option<String>,
    /// API server URL; defaults to the in-cluster service address
    pub api_server: Option<String>,
    /// File holding the controller's own namespace
    pub namespace_path: PathBuf,
    /// Service account token
    pub token_path: PathBuf,
    /// API server CA bundle
    pub ca_path: PathBuf,
}

impl Default for ConfigMapConfig {
    fn default() -> Self {
        let sa = PathBuf::from(SERVICE_ACCOUNT_DIR);
        Self {
            enabled: true,
            name: "alert-rules-config".to_string(),
            namespace: None,
            api_server: None,
            namespace_path: sa.join("namespace"),
            token_path: sa.join("token"),
            ca_path: sa.join("ca.crt"),
        }
    }
}
