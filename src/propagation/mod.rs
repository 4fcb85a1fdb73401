//! Rule propagation
//!
//! After a revision is published it is pushed to the cluster (ConfigMap) and
//! Prometheus is asked to reload. Every sink failure is logged and dropped;
//! the next published pass naturally retries with the newer document.

mod configmap;
mod reload;

pub use configmap::{ConfigMapPropagator, ConfigMapTarget};
pub use reload::ReloadPropagator;

use crate::error::PropagationError;

/// Destination for a published rule file
pub trait Propagator: Send {
    /// Push the full rule file text
    fn propagate(&self, document: &str) -> Result<(), PropagationError>;

    /// Sink name for identification
    fn name(&self) -> &str;
}

/// Runs every configured sink in order
#[derive(Default)]
pub struct PropagationManager {
    sinks: Vec<Box<dyn Propagator>>,
}

impl PropagationManager {
    /// Create a manager with no sinks
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink
    pub fn add_sink(&mut self, sink: Box<dyn Propagator>) {
        self.sinks.push(sink);
    }

    /// Number of configured sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Push the document to every sink, returning how many failed
    ///
    /// A failing sink does not stop the ones after it.
    pub fn propagate_all(&self, document: &str) -> usize {
        let mut failures = 0;
        for sink in &self.sinks {
            match sink.propagate(document) {
                Ok(()) => log::info!("Propagated rules via {}", sink.name()),
                Err(e) => {
                    failures += 1;
                    log::error!("Failed to propagate rules via {}: {}", sink.name(), e);
                }
            }
        }
        failures
    }
}
