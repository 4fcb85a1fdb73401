//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod render;
pub mod run;

pub use render::run_render;
pub use run::run_daemon;
