//! Pending batch
//!
//! Ordered queue of entity descriptors waiting for the next materialization
//! pass. Producers only append, the materializer only drains, and both go
//! through one mutex that is never held across I/O. The same mutex backs a
//! condition variable so the materializer can sleep until either trigger
//! condition holds.

use crate::batch::{Debounce, Trigger, TriggerConfig};
use crate::domain::EntityDescriptor;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct BatchState {
    entries: Vec<EntityDescriptor>,
    closed: bool,
}

/// Lock-protected batch with size and deadline wake-up
#[derive(Debug)]
pub struct PendingBatch {
    config: TriggerConfig,
    state: Mutex<BatchState>,
    full: Condvar,
}

impl PendingBatch {
    /// Create an empty batch
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BatchState::default()),
            full: Condvar::new(),
        }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        // Entries are plain values; a panicking holder cannot leave them torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append entities in order, returning the pending count afterwards
    ///
    /// Wakes the materializer once the count reaches `max_pending`. The
    /// signal is sent after the lock is released.
    pub fn append<I>(&self, entities: I) -> usize
    where
        I: IntoIterator<Item = EntityDescriptor>,
    {
        let pending = {
            let mut state = self.lock();
            state.entries.extend(entities);
            state.entries.len()
        };

        if pending >= self.config.max_pending {
            log::info!("Pending batch is full: {} entities", pending);
            self.full.notify_one();
        }
        pending
    }

    /// Move every pending entity out, leaving the batch empty
    pub fn drain_all(&self) -> Vec<EntityDescriptor> {
        std::mem::take(&mut self.lock().entries)
    }

    /// Number of pending entities
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting waits; the materializer wakes with `Trigger::Shutdown`
    pub fn close(&self) {
        self.lock().closed = true;
        self.full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Block until the batch is full, the debounce deadline passes or the
    /// batch is closed
    pub fn wait(&self, debounce: &Debounce) -> Trigger {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Trigger::Shutdown;
            }
            if state.entries.len() >= self.config.max_pending {
                return Trigger::Size;
            }
            let remaining = debounce.remaining();
            if remaining.is_zero() {
                return Trigger::Deadline;
            }
            state = self
                .full
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn config(max_pending: usize, max_wait: Duration) -> TriggerConfig {
        TriggerConfig {
            max_pending,
            max_wait,
        }
    }

    fn add(pod: &str) -> EntityDescriptor {
        EntityDescriptor::added("ns1", pod, "c1", "1")
    }

    #[test]
    fn test_append_preserves_order() {
        let batch = PendingBatch::new(TriggerConfig::default());
        batch.append(vec![add("a"), add("b")]);
        batch.append(vec![add("c")]);

        let drained: Vec<_> = batch
            .drain_all()
            .iter()
            .map(|e| e.unit_id().to_string())
            .collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_drain_empty() {
        let batch = PendingBatch::new(TriggerConfig::default());
        assert!(batch.drain_all().is_empty());
    }

    #[test]
    fn test_size_trigger_fires_before_deadline() {
        let batch = Arc::new(PendingBatch::new(config(3, Duration::from_secs(60))));
        let debounce = Debounce::start(batch.config().max_wait);

        let producer = {
            let batch = Arc::clone(&batch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                batch.append(vec![add("a"), add("b"), add("c")]);
            })
        };

        let started = Instant::now();
        assert_eq!(batch.wait(&debounce), Trigger::Size);
        assert!(started.elapsed() < Duration::from_secs(10));
        producer.join().unwrap();
    }

    #[test]
    fn test_deadline_trigger_below_threshold() {
        let batch = PendingBatch::new(config(3, Duration::from_millis(50)));
        let debounce = Debounce::start(batch.config().max_wait);
        batch.append(vec![add("a")]);

        let started = Instant::now();
        assert_eq!(batch.wait(&debounce), Trigger::Deadline);
        assert!(started.elapsed() >= Duration::from_millis(45));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_already_full_returns_immediately() {
        let batch = PendingBatch::new(config(2, Duration::from_secs(60)));
        assert_eq!(batch.append(vec![add("a"), add("b")]), 2);
        let debounce = Debounce::start(batch.config().max_wait);
        assert_eq!(batch.wait(&debounce), Trigger::Size);
    }

    #[test]
    fn test_close_wakes_waiter() {
        let batch = Arc::new(PendingBatch::new(config(10, Duration::from_secs(60))));
        let debounce = Debounce::start(batch.config().max_wait);

        let closer = {
            let batch = Arc::clone(&batch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                batch.close();
            })
        };

        assert_eq!(batch.wait(&debounce), Trigger::Shutdown);
        assert!(batch.is_closed());
        closer.join().unwrap();
    }
}
