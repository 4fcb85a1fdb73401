//! Event batching
//!
//! Coalesces entity descriptors so the rule file is rewritten, and Prometheus
//! reloaded, at most once per batch.

mod pending;
mod trigger;

pub use pending::PendingBatch;
pub use trigger::{Debounce, Trigger, TriggerConfig, MAX_WAIT_SECONDS};
