//! Debounce trigger
//!
//! A materialization pass runs when the pending batch reaches `max_pending`
//! entries or when `max_wait` has elapsed since the last pass, whichever
//! comes first.

use std::fmt;
use std::time::{Duration, Instant};

/// Longest accepted debounce window, one year
pub const MAX_WAIT_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Trigger thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Pending entries that force an immediate pass
    pub max_pending: usize,
    /// Longest time entries may wait for a pass
    pub max_wait: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            max_pending: 60,
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Why the materializer woke up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The batch reached `max_pending`
    Size,
    /// The debounce window elapsed
    Deadline,
    /// The batch was closed; run a final pass and stop
    Shutdown,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => write!(f, "batch full"),
            Self::Deadline => write!(f, "window elapsed"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Debounce window, restarted after every pass
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Instant,
}

impl Debounce {
    /// Start a window ending `window` from now
    pub fn start(window: Duration) -> Self {
        Self {
            window,
            deadline: deadline_after(window),
        }
    }

    /// Restart the window from now
    pub fn restart(&mut self) {
        self.deadline = deadline_after(self.window);
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// `now + window`, clamped to `MAX_WAIT_SECONDS` when the sum is not
/// representable
fn deadline_after(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(window)
        .or_else(|| now.checked_add(Duration::from_secs(MAX_WAIT_SECONDS)))
        .unwrap_or(now)
}
