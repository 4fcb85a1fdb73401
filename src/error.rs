//! Unified error types for podalert
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from domain type validation
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Fatal error while materializing the rule file
    #[error("Materialization failed: {0}")]
    Materialize(#[from] MaterializeError),

    /// Error reading the pod event stream
    #[error("Event stream error: {0}")]
    Event(#[from] EventError),

    /// Error from a propagation sink
    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),

    /// The materializer thread terminated abnormally
    #[error("Engine thread panicked")]
    EnginePanicked,

    /// Failed to install the shutdown signal handler
    #[error("Failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from domain type validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required identity field is empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Threshold is not a positive decimal number
    #[error("Invalid threshold: '{0}' (must be a positive decimal)")]
    InvalidThreshold(String),

    /// CPU quantity could not be parsed
    #[error("Invalid CPU quantity: '{0}'")]
    InvalidQuantity(String),

    /// Identity component contains a character that would break the rule file
    #[error("Invalid identity component '{value}' for {field}")]
    InvalidIdentity { field: &'static str, value: String },
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Stage of a materialization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Creating the initial rule file
    Initialize,
    /// Reading the current rule file and applying the batch
    Rewrite,
    /// Checking the candidate rule file
    Validate,
    /// Writing and swapping the candidate into place
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialize => write!(f, "initialize"),
            Self::Rewrite => write!(f, "rewrite"),
            Self::Validate => write!(f, "validate"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Fatal integrity errors raised by the materializer
///
/// Any of these stops the engine: an unvalidated or half-written rule set
/// must never reach Prometheus.
#[derive(Error, Debug)]
pub enum MaterializeError {
    /// Filesystem operation on the rule file failed
    #[error("{stage} failed on {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The candidate rule file was rejected by the checker
    #[error("candidate {} rejected: {source}", path.display())]
    Rejected {
        path: PathBuf,
        #[source]
        source: CheckError,
    },
}

impl MaterializeError {
    /// Stage at which the pass failed
    pub fn stage(&self) -> Stage {
        match self {
            Self::Io { stage, .. } => *stage,
            Self::Rejected { .. } => Stage::Validate,
        }
    }
}

/// Errors from the external rule-syntax checker
#[derive(Error, Debug)]
pub enum CheckError {
    /// The checker ran and reported a syntax problem
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The checker binary could not be started
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Transient errors from propagation sinks
#[derive(Error, Debug)]
pub enum PropagationError {
    /// HTTP request failed
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Local credentials or namespace could not be read
    #[error("cannot read {}: {source}", path.display())]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sink is missing a required setting
    #[error("sink not configured: {0}")]
    NotConfigured(String),
}

/// Errors from the pod event stream
#[derive(Error, Debug)]
pub enum EventError {
    /// Reading the stream failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Event JSON could not be decoded
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
