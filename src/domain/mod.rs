//! Domain models for podalert
//!
//! This module contains the entity descriptor handed from the event source to
//! the materializer, plus the CPU quantity type used to derive thresholds.

pub mod entity;
pub mod quantity;

pub use entity::{EntityDescriptor, KeySelector, RuleKey, Threshold};
pub use quantity::CpuQuantity;
