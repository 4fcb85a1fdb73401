//! Materialization engine
//!
//! Owns the pending batch and runs the materializer loop on its own thread:
//! wait for a trigger, run one pass, propagate what was published, restart
//! the debounce window. Producers hold an `Arc<PendingBatch>` and only
//! append.

use crate::batch::{Debounce, PendingBatch, Trigger, TriggerConfig};
use crate::error::{AppError, MaterializeError};
use crate::propagation::PropagationManager;
use crate::services::materializer::{Materializer, PassOutcome};

use std::sync::Arc;
use std::thread;

/// Totals over the engine's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Passes run, including empty ones
    pub passes: usize,
    /// Passes that published a new revision
    pub published: usize,
    /// Entities drained across all passes
    pub entities: usize,
    /// Propagation sink failures
    pub propagation_failures: usize,
}

/// Batching and materialization engine
pub struct Engine {
    batch: Arc<PendingBatch>,
    materializer: Materializer,
    propagation: PropagationManager,
}

impl Engine {
    /// Create an engine with an empty batch
    pub fn new(
        trigger: TriggerConfig,
        materializer: Materializer,
        propagation: PropagationManager,
    ) -> Self {
        Self {
            batch: Arc::new(PendingBatch::new(trigger)),
            materializer,
            propagation,
        }
    }

    /// Shared handle producers append to
    pub fn batch(&self) -> Arc<PendingBatch> {
        Arc::clone(&self.batch)
    }

    /// Initialize the rule file and loop until the batch is closed
    ///
    /// Returns on shutdown after a final pass, or with the first fatal error.
    pub fn run(mut self) -> Result<EngineStats, MaterializeError> {
        self.materializer.initialize()?;

        let mut stats = EngineStats::default();
        let mut debounce = Debounce::start(self.batch.config().max_wait);
        log::info!(
            "Engine started: max {} pending, window {:?}, {} sinks",
            self.batch.config().max_pending,
            debounce.window(),
            self.propagation.sink_count()
        );

        loop {
            let trigger = self.batch.wait(&debounce);
            log::debug!("Woke up: {}", trigger);

            self.step(&mut stats)?;
            debounce.restart();

            if trigger == Trigger::Shutdown {
                log::info!(
                    "Engine stopped after {} passes ({} published)",
                    stats.passes,
                    stats.published
                );
                return Ok(stats);
            }
        }
    }

    /// One pass plus propagation
    fn step(&mut self, stats: &mut EngineStats) -> Result<(), MaterializeError> {
        let outcome = self.materializer.run_pass(&self.batch)?;
        stats.passes += 1;

        match &outcome {
            PassOutcome::Empty => {}
            PassOutcome::Unchanged(summary) => stats.entities += summary.drained,
            PassOutcome::Published { summary, document } => {
                stats.entities += summary.drained;
                stats.published += 1;
                stats.propagation_failures += self.propagation.propagate_all(document);
            }
        }
        Ok(())
    }

    /// Run the engine on a dedicated thread
    pub fn spawn(self) -> EngineHandle {
        let batch = self.batch();
        let thread = thread::Builder::new()
            .name("materializer".to_string())
            .spawn(move || self.run());

        EngineHandle { batch, thread }
    }
}

/// Handle to a running engine
pub struct EngineHandle {
    batch: Arc<PendingBatch>,
    thread: std::io::Result<thread::JoinHandle<Result<EngineStats, MaterializeError>>>,
}

impl EngineHandle {
    /// Shared batch for producers
    pub fn batch(&self) -> Arc<PendingBatch> {
        Arc::clone(&self.batch)
    }

    /// Whether the engine thread has exited (normally or with a fatal error)
    pub fn is_finished(&self) -> bool {
        match &self.thread {
            Ok(handle) => handle.is_finished(),
            Err(_) => true,
        }
    }

    /// Close the batch and wait for the final pass
    pub fn shutdown(self) -> Result<EngineStats, AppError> {
        self.batch.close();
        self.join()
    }

    /// Wait for the engine thread to exit
    pub fn join(self) -> Result<EngineStats, AppError> {
        let handle = self.thread?;
        match handle.join() {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::EnginePanicked),
        }
    }
}
