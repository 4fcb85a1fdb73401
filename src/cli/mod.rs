//! CLI argument parsing
//!
//! Uses clap for ergonomic CLI argument definitions.

pub mod args;

pub use args::{Cli, Commands, RenderArgs, RenderOutput, RunArgs};
