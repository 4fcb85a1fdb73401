//! podalert - pod-driven Prometheus CPU alert rule generator
//!
//! This library keeps a Prometheus rule file in sync with the pods running
//! in a cluster: one CPU usage alert per container, sized by the container's
//! CPU request. Pod events are batched, applied to the rule file in arrival
//! order, checked with promtool and swapped in atomically.
//!
//! # Modules
//!
//! - [`batch`]: Pending entity batch and flush triggers
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`domain`]: Domain models with validation
//! - [`error`]: Error types
//! - [`events`]: Pod watch event decoding
//! - [`propagation`]: Post-publication sinks (ConfigMap, Prometheus reload)
//! - [`rules`]: Rule text codec and document model
//! - [`services`]: Checker, publisher, materializer and engine

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod propagation;
pub mod rules;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
