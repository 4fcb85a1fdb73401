//! Pod event source
//!
//! Turns a Kubernetes pod watch stream (as printed by
//! `kubectl get pods -A --watch --output-watch-events -o json`) into entity
//! descriptors for the pending batch.

pub mod pod;
pub mod stream;

pub use pod::{translate, EventType, Pod, WatchEvent};
pub use stream::{forward_events, EventStream, StreamItem, StreamStats};
