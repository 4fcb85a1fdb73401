//! Service layer for rule materialization
//!
//! Services encapsulate the pass logic: checking candidates, publishing the
//! rule file, running passes and driving them from the debounce trigger.

pub mod checker;
pub mod engine;
pub mod materializer;
pub mod publisher;

pub use checker::{NoopChecker, PromtoolChecker, RuleChecker};
pub use engine::{Engine, EngineHandle, EngineStats};
pub use materializer::{Materializer, MaterializerState, PassOutcome, PassSummary};
pub use publisher::AtomicPublisher;
